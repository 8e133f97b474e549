//! Tracing infrastructure for forward-mode differentiation.
//!
//! This module records array operations into an intermediate
//! representation (IR), pushes tangents through the recorded graph, and
//! maps per-direction functions over a trailing lane axis.

pub mod ir;
pub mod jvp;
pub mod tracer;
pub mod vmap;

pub use ir::{IRGraph, IRNode, Primitive};
pub use jvp::JVPEngine;
pub use tracer::{
    enter_trace, is_tracing, suspend_trace, trace_binary, trace_unary, with_trace,
    TraceContext, TraceGuard,
};
pub use vmap::vmap_last;
