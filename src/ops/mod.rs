//! Array operations.
//!
//! Every operation computes its result eagerly on the CPU and, while a trace
//! is active, records itself so tangents can be pushed through it later.

pub mod binary;
pub mod linalg;
pub mod reduce;
pub mod unary;
