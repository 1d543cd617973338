//! Trigonometric operations over an angle in radians

use serde_json::Value;

use super::traits::{required_number, Operation, OperationResult, ParamSpec, Params};
use crate::error::Result;

const ANGLE_PARAMS: [ParamSpec; 1] = [ParamSpec::required("angle", "Angle in radians")];

pub struct TrigOperation {
    name: &'static str,
    description: &'static str,
    apply: fn(f64) -> f64,
}

impl TrigOperation {
    pub fn sin() -> Self {
        TrigOperation {
            name: "sin",
            description: "Calculate the sine of an angle (in radians)",
            apply: f64::sin,
        }
    }

    pub fn cos() -> Self {
        TrigOperation {
            name: "cos",
            description: "Calculate the cosine of an angle (in radians)",
            apply: f64::cos,
        }
    }

    pub fn tan() -> Self {
        TrigOperation {
            name: "tan",
            description: "Calculate the tangent of an angle (in radians)",
            apply: f64::tan,
        }
    }
}

impl Operation for TrigOperation {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters(&self) -> &[ParamSpec] {
        &ANGLE_PARAMS
    }

    fn execute(&self, params: &Params) -> Result<Value> {
        let angle = required_number(params, "angle")?;
        Ok(OperationResult::new(self.name, (self.apply)(angle))
            .with_input("angle", angle)
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::f64::consts::PI;

    #[test]
    fn test_trig_values() {
        let params = json!({"angle": PI / 2.0});
        let params = params.as_object().unwrap();

        let sin = TrigOperation::sin().execute(params).unwrap();
        assert!((sin["result"].as_f64().unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(sin["operation"], "sin");
        assert_eq!(sin["angle"].as_f64(), Some(PI / 2.0));

        let cos = TrigOperation::cos().execute(params).unwrap();
        assert!(cos["result"].as_f64().unwrap().abs() < 1e-12);

        let tan = TrigOperation::tan()
            .execute(json!({"angle": PI / 4.0}).as_object().unwrap())
            .unwrap();
        assert!((tan["result"].as_f64().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_trig_rejects_non_numeric_angle() {
        let err = TrigOperation::sin()
            .execute(json!({"angle": "right"}).as_object().unwrap())
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidArgument(_)));
    }
}
