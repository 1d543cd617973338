//! Operation table - name to handler lookup

use std::collections::HashMap;

use serde_json::Value;

use super::arithmetic::{BinaryOperation, SqrtOperation};
use super::builtin::{DiscoverOperation, EchoOperation};
use super::logarithm::LogOperation;
use super::traits::{Operation, OperationDefinition, Params};
use super::trig::TrigOperation;
use crate::error::{Error, Result};

/// Registry of dispatchable operations, in registration order
pub struct OperationTable {
    operations: Vec<Box<dyn Operation>>,
    index: HashMap<String, usize>,
}

impl Default for OperationTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl OperationTable {
    /// Create a new empty table
    pub fn new() -> Self {
        OperationTable {
            operations: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// The full math catalog plus `discover` and `echo`
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register(BinaryOperation::add());
        table.register(BinaryOperation::subtract());
        table.register(BinaryOperation::multiply());
        table.register(BinaryOperation::divide());
        table.register(BinaryOperation::power());
        table.register(SqrtOperation);
        table.register(TrigOperation::sin());
        table.register(TrigOperation::cos());
        table.register(TrigOperation::tan());
        table.register(LogOperation);

        let catalog = table.catalog();
        table.register(DiscoverOperation::new(catalog));
        table.register(EchoOperation);
        table
    }

    /// Register an operation, replacing any previous one with the same name
    pub fn register<T: Operation + 'static>(&mut self, operation: T) {
        let name = operation.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => self.operations[slot] = Box::new(operation),
            None => {
                self.index.insert(name, self.operations.len());
                self.operations.push(Box::new(operation));
            }
        }
    }

    /// Get an operation by name
    pub fn get(&self, name: &str) -> Option<&dyn Operation> {
        self.index
            .get(name)
            .map(|&slot| self.operations[slot].as_ref())
    }

    /// Definitions of every listed operation
    pub fn definitions(&self) -> Vec<OperationDefinition> {
        self.operations
            .iter()
            .filter(|op| op.listed())
            .map(|op| op.to_definition())
            .collect()
    }

    /// Discovery payload: `{tools: [...]}`
    pub fn catalog(&self) -> Value {
        serde_json::json!({ "tools": self.definitions() })
    }

    /// Execute `method` with `params`.
    ///
    /// Failures are tagged with the method name; an unknown name fails with
    /// `UnknownMethod`.
    pub fn execute(&self, method: &str, params: &Params) -> Result<Value> {
        let operation = self
            .get(method)
            .ok_or_else(|| Error::UnknownMethod(method.to_string()))?;
        operation
            .execute(params)
            .map_err(|e| e.in_method(method))
    }

    /// Get operation count
    pub fn count(&self) -> usize {
        self.operations.len()
    }

    /// List operation names
    pub fn names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_builtin_table() {
        let table = OperationTable::builtin();
        assert_eq!(table.count(), 12);
        assert_eq!(
            table.names(),
            vec![
                "add", "subtract", "multiply", "divide", "power", "sqrt", "sin", "cos", "tan",
                "log", "discover", "echo"
            ]
        );
    }

    #[test]
    fn test_unknown_method() {
        let table = OperationTable::builtin();
        let err = table.execute("modulo", &Params::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownMethod(ref m) if m == "modulo"));
        assert_eq!(err.to_string(), "Unknown method: modulo");
    }

    #[test]
    fn test_failures_are_tagged() {
        let table = OperationTable::builtin();
        let err = table
            .execute("divide", &params(json!({"a": 1, "b": 0})))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DivisionByZero);
        assert_eq!(err.method(), Some("divide"));
    }

    #[test]
    fn test_discover_catalog_shape() {
        let table = OperationTable::builtin();
        let catalog = table.execute("discover", &Params::new()).unwrap();
        let tools = catalog["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 10);

        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert!(!names.contains(&"discover"));
        assert!(!names.contains(&"echo"));

        let log = tools.iter().find(|t| t["name"] == "log").unwrap();
        assert_eq!(log["parameters"]["type"], "object");
        assert_eq!(log["parameters"]["properties"]["value"]["type"], "number");
        assert_eq!(log["parameters"]["properties"]["base"]["type"], "number");
        assert_eq!(log["parameters"]["required"], json!(["value"]));

        let divide = tools.iter().find(|t| t["name"] == "divide").unwrap();
        assert_eq!(divide["parameters"]["required"], json!(["a", "b"]));
        assert_eq!(
            divide["parameters"]["properties"]["b"]["description"],
            "Denominator"
        );
    }

    #[test]
    fn test_echo_returns_params_unchanged() {
        let table = OperationTable::builtin();
        let p = params(json!({"text": "hi", "n": [1, 2]}));
        let out = table.execute("echo", &p).unwrap();
        assert_eq!(out, json!({"method": "echo", "params": {"text": "hi", "n": [1, 2]}}));
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut table = OperationTable::builtin();
        table.register(EchoOperation);
        assert_eq!(table.count(), 12);
    }
}
