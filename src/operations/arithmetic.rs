//! Arithmetic operations
//!
//! Binary operations (add, subtract, multiply, divide, power) share one
//! handler type parameterised by a function pointer; sqrt is unary.

use serde_json::Value;

use super::traits::{required_number, Operation, OperationResult, ParamSpec, Params};
use crate::error::{Error, Result};

type BinaryFn = fn(f64, f64) -> Result<f64>;

/// Operation over two named numeric inputs
pub struct BinaryOperation {
    name: &'static str,
    description: &'static str,
    params: [ParamSpec; 2],
    apply: BinaryFn,
}

impl BinaryOperation {
    pub fn add() -> Self {
        BinaryOperation {
            name: "add",
            description: "Add two numbers",
            params: operands("First number", "Second number"),
            apply: |a, b| Ok(a + b),
        }
    }

    pub fn subtract() -> Self {
        BinaryOperation {
            name: "subtract",
            description: "Subtract second number from first number",
            params: operands("First number", "Second number"),
            apply: |a, b| Ok(a - b),
        }
    }

    pub fn multiply() -> Self {
        BinaryOperation {
            name: "multiply",
            description: "Multiply two numbers",
            params: operands("First number", "Second number"),
            apply: |a, b| Ok(a * b),
        }
    }

    pub fn divide() -> Self {
        BinaryOperation {
            name: "divide",
            description: "Divide first number by second number",
            params: operands("Numerator", "Denominator"),
            apply: |a, b| {
                if b == 0.0 {
                    return Err(Error::DivisionByZero);
                }
                Ok(a / b)
            },
        }
    }

    pub fn power() -> Self {
        BinaryOperation {
            name: "power",
            description: "Raise a number to a power",
            params: [
                ParamSpec::required("base", "Base number"),
                ParamSpec::required("exponent", "Exponent"),
            ],
            apply: |base, exponent| Ok(base.powf(exponent)),
        }
    }
}

fn operands(first: &'static str, second: &'static str) -> [ParamSpec; 2] {
    [
        ParamSpec::required("a", first),
        ParamSpec::required("b", second),
    ]
}

impl Operation for BinaryOperation {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters(&self) -> &[ParamSpec] {
        &self.params
    }

    fn execute(&self, params: &Params) -> Result<Value> {
        let [left, right] = self.params;
        let x = required_number(params, left.name)?;
        let y = required_number(params, right.name)?;
        let result = (self.apply)(x, y)?;

        Ok(OperationResult::new(self.name, result)
            .with_input(left.name, x)
            .with_input(right.name, y)
            .into_value())
    }
}

/// Square root of a non-negative number
pub struct SqrtOperation;

const SQRT_PARAMS: [ParamSpec; 1] = [ParamSpec::required(
    "value",
    "The number to calculate the square root of",
)];

impl Operation for SqrtOperation {
    fn name(&self) -> &str {
        "sqrt"
    }

    fn description(&self) -> &str {
        "Calculate the square root of a number"
    }

    fn parameters(&self) -> &[ParamSpec] {
        &SQRT_PARAMS
    }

    fn execute(&self, params: &Params) -> Result<Value> {
        let value = required_number(params, "value")?;
        if value < 0.0 {
            return Err(Error::Domain(
                "Cannot calculate square root of a negative number".to_string(),
            ));
        }

        Ok(OperationResult::new("sqrt", value.sqrt())
            .with_input("value", value)
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(op: &dyn Operation, params: Value) -> Result<Value> {
        op.execute(params.as_object().unwrap())
    }

    #[test]
    fn test_basic_arithmetic() {
        let cases = [
            (BinaryOperation::add(), 7.5),
            (BinaryOperation::subtract(), 2.5),
            (BinaryOperation::multiply(), 12.5),
            (BinaryOperation::divide(), 2.0),
        ];
        for (op, expected) in cases {
            let out = run(&op, json!({"a": 5, "b": 2.5})).unwrap();
            assert_eq!(out["result"].as_f64(), Some(expected), "{}", op.name());
            assert_eq!(out["operation"], op.name());
            assert_eq!(out["a"].as_f64(), Some(5.0));
            assert_eq!(out["b"].as_f64(), Some(2.5));
        }
    }

    #[test]
    fn test_divide_by_zero() {
        for a in [0.0, 1.0, -3.5, 1e300] {
            let err = run(&BinaryOperation::divide(), json!({"a": a, "b": 0})).unwrap_err();
            assert!(matches!(err, Error::DivisionByZero));
        }
    }

    #[test]
    fn test_power_echoes_base_and_exponent() {
        let out = run(&BinaryOperation::power(), json!({"base": 2, "exponent": 10})).unwrap();
        assert_eq!(out["result"].as_f64(), Some(1024.0));
        assert_eq!(out["operation"], "power");
        assert_eq!(out["base"].as_f64(), Some(2.0));
        assert_eq!(out["exponent"].as_f64(), Some(10.0));
        assert!(out.get("a").is_none());
    }

    #[test]
    fn test_missing_operand_is_invalid_argument() {
        let err = run(&BinaryOperation::add(), json!({"a": 1})).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        let err = run(&BinaryOperation::add(), json!({"a": "x", "b": 1})).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_sqrt() {
        for v in [0.0, 1.0, 2.0, 144.0, 1e-6, 12345.678] {
            let out = run(&SqrtOperation, json!({"value": v})).unwrap();
            let r = out["result"].as_f64().unwrap();
            assert!(r >= 0.0);
            assert!((r * r - v).abs() <= 1e-9 * v.max(1.0));
        }

        for v in [-1.0, -0.5, -1e9] {
            let err = run(&SqrtOperation, json!({"value": v})).unwrap_err();
            assert!(matches!(err, Error::Domain(_)));
        }
    }
}
