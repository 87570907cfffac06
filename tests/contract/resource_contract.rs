use std::sync::Arc;

use envision_core::fixtures::{sample_data, sample_envelope};
use envision_core::resources::{self, Resource};
use envision_core::{
    ApiClient, Config, DashboardApi, DashboardFilters, FixtureHttpClient, ForecastParams,
    QueryParams, RequestDescriptor, ResourceKind, Schema, ScriptedHttpClient, ScriptedReply,
    TimeRange,
};
use serde_json::{json, Value};

fn config() -> Config {
    Config::default().with_base_url("http://api.envision.test")
}

async fn fetch_json<R: Resource>(api: &DashboardApi, params: &QueryParams) -> Value {
    let output = api
        .fetch::<R>(params)
        .await
        .unwrap_or_else(|error| panic!("{} should validate: {error}", R::NAME));
    serde_json::to_value(output).expect("outputs serialize")
}

async fn fetch_all(api: &DashboardApi) -> Vec<(ResourceKind, Value)> {
    let params = QueryParams::new();
    let mut outputs = Vec::new();
    for kind in ResourceKind::ALL {
        let value = match kind {
            ResourceKind::Kpis => fetch_json::<resources::Kpis>(api, &params).await,
            ResourceKind::EnergyTrend => fetch_json::<resources::EnergyTrend>(api, &params).await,
            ResourceKind::DeviationOverTime => {
                fetch_json::<resources::DeviationOverTime>(api, &params).await
            }
            ResourceKind::Deviations => fetch_json::<resources::Deviations>(api, &params).await,
            ResourceKind::Anomalies => fetch_json::<resources::Anomalies>(api, &params).await,
            ResourceKind::Forecast => fetch_json::<resources::Forecast>(api, &params).await,
            ResourceKind::CarbonMetrics => {
                fetch_json::<resources::CarbonMetrics>(api, &params).await
            }
            ResourceKind::CarbonBreakdown => {
                fetch_json::<resources::CarbonBreakdown>(api, &params).await
            }
            ResourceKind::AiInsights => fetch_json::<resources::AiInsights>(api, &params).await,
            ResourceKind::Recommendations => {
                fetch_json::<resources::Recommendations>(api, &params).await
            }
            ResourceKind::CostMetrics => fetch_json::<resources::CostMetrics>(api, &params).await,
            ResourceKind::EnergyIntensity => {
                fetch_json::<resources::EnergyIntensity>(api, &params).await
            }
            ResourceKind::ActiveAppliances => {
                fetch_json::<resources::ActiveAppliances>(api, &params).await
            }
        };
        outputs.push((kind, value));
    }
    outputs
}

#[tokio::test]
async fn every_resource_validates_against_demo_payloads() {
    let http = Arc::new(FixtureHttpClient::new());
    let api = DashboardApi::with_http_client(http.clone(), &config());

    let outputs = fetch_all(&api).await;

    assert_eq!(outputs.len(), ResourceKind::ALL.len());
    assert_eq!(http.calls(), ResourceKind::ALL.len());
    for (kind, value) in outputs {
        let expected = sample_data(kind);
        match kind {
            ResourceKind::Forecast => {
                assert_eq!(value.as_array().map(Vec::len), Some(2), "{kind}");
            }
            _ if expected.is_array() => {
                assert_eq!(
                    value.as_array().map(Vec::len),
                    expected.as_array().map(Vec::len),
                    "{kind}"
                );
            }
            _ => assert!(value.is_object(), "{kind}: {value}"),
        }
    }
}

#[tokio::test]
async fn typed_endpoints_hit_their_fixed_paths() {
    let http = Arc::new(ScriptedHttpClient::new());
    for kind in ResourceKind::ALL {
        http.push(ScriptedReply::json(200, &sample_envelope(kind)));
    }
    let api = DashboardApi::with_http_client(http.clone(), &config());
    let filters = DashboardFilters::range(TimeRange::Last30Days);

    api.kpis(&filters).await.expect("kpis");
    api.energy_trend(&filters).await.expect("energy trend");
    api.deviation_over_time(&filters).await.expect("deviation over time");
    api.deviations().await.expect("deviations");
    api.anomalies(&filters).await.expect("anomalies");
    api.forecast(&ForecastParams::default()).await.expect("forecast");
    api.carbon_metrics(&filters).await.expect("carbon metrics");
    api.carbon_breakdown(&filters).await.expect("carbon breakdown");
    api.ai_insights(&filters).await.expect("ai insights");
    api.recommendations(&filters).await.expect("recommendations");
    api.cost_metrics(&filters).await.expect("cost metrics");
    api.energy_intensity(&filters).await.expect("energy intensity");
    api.active_appliances(&filters).await.expect("active appliances");

    let requests = http.requests();
    assert_eq!(requests.len(), ResourceKind::ALL.len());
    for (request, kind) in requests.iter().zip(ResourceKind::ALL) {
        let expected = if kind.accepts_filters() {
            format!("http://api.envision.test{}?range=30d", kind.path())
        } else {
            format!("http://api.envision.test{}", kind.path())
        };
        assert_eq!(request.url, expected, "{kind}");
    }
}

#[tokio::test]
async fn forecast_points_survive_unchanged() {
    let http = Arc::new(FixtureHttpClient::new());
    let api = DashboardApi::with_http_client(http, &config());

    let points = api
        .forecast(&ForecastParams::default())
        .await
        .expect("forecast");

    let sample = sample_data(ResourceKind::Forecast);
    let sample = sample["values"].as_array().expect("sample values");
    assert_eq!(points.len(), sample.len());
    for (point, raw) in points.iter().zip(sample) {
        assert_eq!(Some(point.forecast_date.as_str()), raw["forecast_date"].as_str());
        assert_eq!(Some(point.predicted_kwh), raw["predicted_kwh"].as_f64());
        assert_eq!(Some(point.is_forecast), raw["is_forecast"].as_bool());
    }
}

#[test]
fn every_schema_rejects_a_foreign_shape() {
    for kind in ResourceKind::ALL {
        assert!(
            kind.schema().validate(&json!({"unexpected": true})).is_err(),
            "{kind} accepted a foreign object"
        );
        assert!(kind.schema().validate(&json!("text")).is_err(), "{kind}");
    }
}

#[tokio::test]
async fn unknown_paths_are_rejected_by_the_demo_backend() {
    let client = ApiClient::with_http_client(Arc::new(FixtureHttpClient::new()), &config());
    let descriptor = RequestDescriptor::get("weather", "/dashboard/weather", QueryParams::new());

    let error = client
        .fetch::<Value>(&descriptor, &Schema::Any)
        .await
        .expect_err("no such resource");

    assert_eq!(error.status(), Some(404));
}
