//! Functions that can be differentiated.

use crate::error::{Error, Result};
use crate::{Array, PyTree};
use std::fmt;
use std::sync::{Arc, Weak};

/// A function of positional pytree arguments returning a pytree.
///
/// Closures `Fn(&[PyTree]) -> PyTree` implement this trait directly.
/// Keyword arguments are not modelled: close over them instead.
///
/// # Examples
///
/// ```
/// # use jax_jacfwd::{Array, Function, PyTree, Shape};
/// let f = |args: &[PyTree]| match args[0].as_leaf() {
///     Some(x) => PyTree::Leaf(x.square()),
///     None => PyTree::None,
/// };
/// let x = Array::from_vec(vec![3.0], Shape::new(vec![1]));
/// let y = f.call(&[x.into()]).unwrap();
/// assert_eq!(y.as_leaf().map(Array::to_vec), Some(vec![9.0]));
/// ```
pub trait Function: Sync {
    /// Invoke the function.
    fn call(&self, args: &[PyTree]) -> Result<PyTree>;

    /// Check that the function can still be invoked.
    fn check_callable(&self) -> Result<()> {
        Ok(())
    }
}

impl<F> Function for F
where
    F: Fn(&[PyTree]) -> PyTree + Sync,
{
    fn call(&self, args: &[PyTree]) -> Result<PyTree> {
        Ok(self(args))
    }
}

/// Adapter returned by [`from_array_fn`].
pub struct ArrayFn<F> {
    f: F,
}

impl<F> Function for ArrayFn<F>
where
    F: Fn(&Array) -> Array + Sync,
{
    fn call(&self, args: &[PyTree]) -> Result<PyTree> {
        match args {
            [PyTree::Leaf(x)] => Ok(PyTree::Leaf((self.f)(x))),
            _ => Err(Error::ArgumentStructure(format!(
                "expected a single array argument, got {} arguments",
                args.len()
            ))),
        }
    }
}

impl<F> fmt::Debug for ArrayFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ArrayFn")
    }
}

/// Lift a function of one array to a [`Function`].
///
/// # Examples
///
/// ```
/// # use jax_jacfwd::{from_array_fn, value_and_jacfwd, Array, JacfwdConfig, Shape};
/// let f = value_and_jacfwd(from_array_fn(|x: &Array| x.sin()), JacfwdConfig::default()).unwrap();
/// let x = Array::from_vec_f64(vec![0.0], Shape::new(vec![1]));
/// let out = f.call(&[x.into()]).unwrap();
/// assert_eq!(out.jacobian.as_leaf().map(Array::to_vec), Some(vec![1.0]));
/// ```
pub fn from_array_fn<F>(f: F) -> ArrayFn<F>
where
    F: Fn(&Array) -> Array + Sync,
{
    ArrayFn { f }
}

/// Weak handle to a shared function.
///
/// Once every strong reference is dropped the handle can no longer be
/// invoked and fails with [`Error::NotCallable`].
#[derive(Clone)]
pub struct FunctionHandle {
    inner: Weak<dyn Function + Send>,
}

impl FunctionHandle {
    /// Create a handle that does not keep `f` alive.
    pub fn downgrade<F>(f: &Arc<F>) -> Self
    where
        F: Function + Send + 'static,
    {
        let weak: Weak<F> = Arc::downgrade(f);
        Self { inner: weak }
    }

    fn upgrade(&self) -> Result<Arc<dyn Function + Send>> {
        self.inner
            .upgrade()
            .ok_or_else(|| Error::NotCallable("a handle to a dropped function".to_string()))
    }
}

impl Function for FunctionHandle {
    fn call(&self, args: &[PyTree]) -> Result<PyTree> {
        self.upgrade()?.call(args)
    }

    fn check_callable(&self) -> Result<()> {
        self.upgrade()?.check_callable()
    }
}

impl fmt::Debug for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionHandle").field("alive", &(self.inner.strong_count() > 0)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shape;

    fn double(args: &[PyTree]) -> PyTree {
        args[0].map(|x| x.scale(2.0))
    }

    #[test]
    fn test_fn_items_are_functions() {
        let x = Array::from_vec(vec![1.0, 2.0], Shape::new(vec![2]));
        let y = double.call(&[x.into()]).unwrap();
        assert_eq!(y.leaves()[0].to_vec(), vec![2.0, 4.0]);
        assert!(double.check_callable().is_ok());
    }

    #[test]
    fn test_array_fn_rejects_non_leaf_arguments() {
        let f = from_array_fn(|x: &Array| x.neg());
        let err = f.call(&[PyTree::None]).unwrap_err();
        assert!(matches!(err, Error::ArgumentStructure(_)));
    }

    #[test]
    fn test_handle_to_dropped_function() {
        let shared = Arc::new(double);
        let handle = FunctionHandle::downgrade(&shared);
        assert!(handle.check_callable().is_ok());

        drop(shared);
        assert!(matches!(handle.check_callable(), Err(Error::NotCallable(_))));
        assert!(matches!(handle.call(&[]), Err(Error::NotCallable(_))));
    }
}
