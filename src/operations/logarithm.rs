//! Logarithm with an optional base

use serde_json::Value;

use super::traits::{optional_number, required_number, Operation, OperationResult, ParamSpec, Params};
use crate::error::{Error, Result};

const LOG_PARAMS: [ParamSpec; 2] = [
    ParamSpec::required("value", "The number to calculate the logarithm of"),
    ParamSpec::optional(
        "base",
        "The base of the logarithm (default: natural logarithm)",
    ),
];

/// Natural logarithm when `base` is omitted (`operation: "ln"`), otherwise
/// `ln(value) / ln(base)` (`operation: "log_base"`).
pub struct LogOperation;

impl Operation for LogOperation {
    fn name(&self) -> &str {
        "log"
    }

    fn description(&self) -> &str {
        "Calculate the logarithm of a number with a specified base"
    }

    fn parameters(&self) -> &[ParamSpec] {
        &LOG_PARAMS
    }

    fn execute(&self, params: &Params) -> Result<Value> {
        let value = required_number(params, "value")?;
        if value <= 0.0 {
            return Err(Error::Domain(
                "Value must be positive for logarithm".to_string(),
            ));
        }

        let result = match optional_number(params, "base")? {
            None => OperationResult::new("ln", value.ln()).with_input("value", value),
            Some(base) => {
                if base <= 0.0 || base == 1.0 {
                    return Err(Error::Domain(
                        "Base must be positive and not equal to 1".to_string(),
                    ));
                }
                OperationResult::new("log_base", value.ln() / base.ln())
                    .with_input("value", value)
                    .with_input("base", base)
            }
        };

        Ok(result.into_value())
    }
}
