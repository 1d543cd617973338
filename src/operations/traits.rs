//! Core operation trait, parameter coercion and result types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Named operation inputs as they arrive on the wire
pub type Params = Map<String, Value>;

/// Declared input of an operation, used for discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Whether the caller must supply it
    pub required: bool,
}

impl ParamSpec {
    /// A required numeric parameter
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        ParamSpec {
            name,
            description,
            required: true,
        }
    }

    /// An optional numeric parameter
    pub const fn optional(name: &'static str, description: &'static str) -> Self {
        ParamSpec {
            name,
            description,
            required: false,
        }
    }
}

/// Discovery entry for one operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema object describing the parameters
    pub parameters: Value,
}

/// An operation that can be dispatched by name
pub trait Operation: Send + Sync {
    /// Get the operation name
    fn name(&self) -> &str;

    /// Get the operation description
    fn description(&self) -> &str;

    /// Declared parameters
    fn parameters(&self) -> &[ParamSpec] {
        &[]
    }

    /// Execute the operation with the given parameters
    fn execute(&self, params: &Params) -> Result<Value>;

    /// Whether the operation appears in the discovery catalog
    fn listed(&self) -> bool {
        true
    }

    /// Build the JSON Schema for the declared parameters
    fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in self.parameters() {
            properties.insert(
                spec.name.to_string(),
                serde_json::json!({
                    "type": "number",
                    "description": spec.description,
                }),
            );
            if spec.required {
                required.push(Value::String(spec.name.to_string()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Convert to a discovery definition
    fn to_definition(&self) -> OperationDefinition {
        OperationDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Successful numeric result, echoing the coerced inputs
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub result: f64,
    pub operation: String,
    pub inputs: Map<String, Value>,
}

impl OperationResult {
    pub fn new(operation: impl Into<String>, result: f64) -> Self {
        OperationResult {
            result,
            operation: operation.into(),
            inputs: Map::new(),
        }
    }

    /// Echo a coerced input back to the caller
    pub fn with_input(mut self, name: &str, value: f64) -> Self {
        self.inputs.insert(name.to_string(), number_value(value));
        self
    }

    pub fn into_value(self) -> Value {
        let mut object = Map::new();
        object.insert("result".to_string(), number_value(self.result));
        object.insert("operation".to_string(), Value::String(self.operation));
        object.extend(self.inputs);
        Value::Object(object)
    }
}

/// Non-finite numbers have no JSON form and serialize as `null`
fn number_value(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Coerce a raw parameter to a number.
///
/// Accepts JSON numbers, numeric strings (blank is zero), booleans and
/// `null`. Anything else, including a missing value, is rejected.
pub fn coerce_number(name: &str, value: Option<&Value>) -> Result<f64> {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        Some(Value::Null) => Some(0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) | None => None,
    };

    number
        .filter(|n| !n.is_nan())
        .ok_or_else(|| Error::InvalidArgument(format!("Parameter '{}' must be a number", name)))
}

/// Look up and coerce a required parameter
pub fn required_number(params: &Params, name: &str) -> Result<f64> {
    coerce_number(name, params.get(name))
}

/// Look up and coerce an optional parameter; absent and `null` mean "not given"
pub fn optional_number(params: &Params, name: &str) -> Result<Option<f64>> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => coerce_number(name, Some(value)).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_coerce_accepts_numbers_and_numeric_strings() {
        let p = params(json!({"a": 2.5, "b": " 4 ", "c": true, "d": null, "e": ""}));
        assert_eq!(required_number(&p, "a").unwrap(), 2.5);
        assert_eq!(required_number(&p, "b").unwrap(), 4.0);
        assert_eq!(required_number(&p, "c").unwrap(), 1.0);
        assert_eq!(required_number(&p, "d").unwrap(), 0.0);
        assert_eq!(required_number(&p, "e").unwrap(), 0.0);
    }

    #[test]
    fn test_coerce_rejects_non_numeric() {
        let p = params(json!({"a": "abc", "b": [1], "c": {"x": 1}, "d": "NaN"}));
        for name in ["a", "b", "c", "d", "missing"] {
            let err = required_number(&p, name).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{name}");
        }
    }

    #[test]
    fn test_optional_number() {
        let p = params(json!({"base": null, "value": "10"}));
        assert_eq!(optional_number(&p, "base").unwrap(), None);
        assert_eq!(optional_number(&p, "absent").unwrap(), None);
        assert_eq!(optional_number(&p, "value").unwrap(), Some(10.0));
    }

    #[test]
    fn test_result_echoes_inputs() {
        let value = OperationResult::new("power", 1024.0)
            .with_input("base", 2.0)
            .with_input("exponent", 10.0)
            .into_value();
        assert_eq!(value["result"].as_f64(), Some(1024.0));
        assert_eq!(value["operation"], "power");
        assert_eq!(value["base"].as_f64(), Some(2.0));
        assert_eq!(value["exponent"].as_f64(), Some(10.0));
    }

    #[test]
    fn test_non_finite_result_is_null() {
        let value = OperationResult::new("power", f64::INFINITY).into_value();
        assert!(value["result"].is_null());
    }
}
