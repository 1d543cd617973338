//! Unlisted protocol operations: `discover` and `echo`

use serde_json::Value;

use super::traits::{Operation, Params};
use crate::error::Result;

/// Returns the catalog of listed operations, captured at table build time
pub struct DiscoverOperation {
    catalog: Value,
}

impl DiscoverOperation {
    pub fn new(catalog: Value) -> Self {
        DiscoverOperation { catalog }
    }
}

impl Operation for DiscoverOperation {
    fn name(&self) -> &str {
        "discover"
    }

    fn description(&self) -> &str {
        "List the supported operations and their parameters"
    }

    fn execute(&self, _params: &Params) -> Result<Value> {
        Ok(self.catalog.clone())
    }

    fn listed(&self) -> bool {
        false
    }
}

/// Connectivity check; returns the params untouched
pub struct EchoOperation;

impl Operation for EchoOperation {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the request parameters back"
    }

    fn execute(&self, params: &Params) -> Result<Value> {
        Ok(serde_json::json!({
            "method": "echo",
            "params": params,
        }))
    }

    fn listed(&self) -> bool {
        false
    }
}
