use std::fmt::{Display, Formatter};

use crate::params::QueryParams;
use crate::resources::Resource;

/// Cache identity: resource name plus normalised parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    resource: String,
    params: QueryParams,
}

impl QueryKey {
    pub fn new(resource: impl Into<String>, params: QueryParams) -> Self {
        Self {
            resource: resource.into(),
            params,
        }
    }

    pub fn of<R: Resource>(params: QueryParams) -> Self {
        Self::new(R::NAME, params)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }
}

impl Display for QueryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.params.is_empty() {
            f.write_str(&self.resource)
        } else {
            write!(f, "{}?{}", self.resource, self.params)
        }
    }
}
