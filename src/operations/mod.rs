//! Operations module - the math operation table
//!
//! Each operation implements the `Operation` trait and is registered into an
//! `OperationTable`, which agent sessions dispatch into by method name.
//!
//! ## Built-in Operations
//!
//! - **add / subtract / multiply / divide / power**: binary arithmetic
//! - **sqrt**: square root of a non-negative number
//! - **sin / cos / tan**: trigonometry over radians
//! - **log**: natural logarithm, or logarithm in a given base
//! - **discover**: the catalog of the operations above (unlisted)
//! - **echo**: returns its params, for connectivity checks (unlisted)

mod arithmetic;
mod builtin;
mod logarithm;
mod registry;
mod traits;
mod trig;

// Core trait and types
pub use traits::{
    coerce_number, optional_number, required_number, Operation, OperationDefinition,
    OperationResult, ParamSpec, Params,
};

// Registry
pub use registry::OperationTable;

// Built-in operations
pub use arithmetic::{BinaryOperation, SqrtOperation};
pub use builtin::{DiscoverOperation, EchoOperation};
pub use logarithm::LogOperation;
pub use trig::TrigOperation;
