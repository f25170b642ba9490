//! Authoritative fetch trait

use crate::error::Result;
use crate::types::Query;
use async_trait::async_trait;
use serde_json::Value;

/// Trusted fallback source consulted when peer consensus lacks quorum
#[async_trait]
pub trait AuthoritativeFetch: Send + Sync {
    /// Fetch the authoritative answer for a query; `None` if the oracle has none
    async fn get(&self, query: &Query) -> Result<Option<Value>>;
}

/// Oracle that always answers with the same value; useful for tests and dry runs
pub struct StaticOracle {
    value: Option<Value>,
}

impl StaticOracle {
    /// Create an oracle returning `value` for every query
    pub fn new(value: Option<Value>) -> Self {
        Self { value }
    }
}

#[async_trait]
impl AuthoritativeFetch for StaticOracle {
    async fn get(&self, _query: &Query) -> Result<Option<Value>> {
        Ok(self.value.clone())
    }
}
