//! # jax-jacfwd: forward-mode Jacobians in Rust
//!
//! Computes a function's value together with its full Jacobian, pushing
//! every standard basis direction of the input space through a single
//! traced forward sweep.
//!
//! ## Key Features
//!
//! - **`value_and_jacfwd`**: value, optional auxiliary output and Jacobian in one call
//! - **`jvp`**: Jacobian-vector products over pytrees of arrays
//! - **Pytrees**: nested tuples, lists and dicts as arguments and results
//! - **Batched tangents**: the primal computation runs once for all directions
//!
//! ## Quick Start
//!
//! ```rust
//! use jax_jacfwd::{value_and_jacfwd, Array, JacfwdConfig, PyTree, Shape};
//!
//! let f = |args: &[PyTree]| args[0].map(|x| x.square().sum_all());
//! let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
//!
//! let x = Array::from_vec(vec![0.0, 1.0, 2.0], Shape::new(vec![3]));
//! let out = df.call(&[x.into()]).unwrap();
//! assert_eq!(out.value.as_leaf().and_then(Array::item), Some(5.0));
//! assert_eq!(out.jacobian.as_leaf().map(Array::to_vec), Some(vec![0.0, 2.0, 4.0]));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod array;
mod buffer;
mod dtype;
pub mod error;
mod function;
pub mod jacfwd;
pub mod ops;
pub mod pytree;
pub mod runtime;
mod shape;
pub mod trace;

// Public exports
pub use array::Array;
pub use dtype::DType;
pub use error::{Error, Result};
pub use function::{from_array_fn, ArrayFn, Function, FunctionHandle};
pub use jacfwd::{
    batched_jacobian, check_input_dtype, check_output_dtype, jvp, jvp_with,
    unravel_array_into_pytree, value_and_jacfwd, Argnums, BasisDirection, BatchedJacobian,
    JacfwdConfig, JvpOutput, StandardBasis, ValueAndJacfwd, ValueAndJacobian,
};
pub use pytree::{tree_flatten, tree_unflatten, PyTree, TreeDef};
pub use runtime::{FlatFn, FlatOutput, Looped, Runtime, TracingRuntime};
pub use shape::Shape;
