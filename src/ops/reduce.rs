//! Reduction operations on arrays.

use crate::trace::{is_tracing, trace_unary, Primitive};
use crate::{Array, DType, Shape};
use num_complex::Complex;
use std::ops::Add;

/// Sum along `axis` of row-major data with dimensions `dims`.
fn sum_axis_data<T>(data: &[T], dims: &[usize], axis: usize, zero: T) -> Vec<T>
where
    T: Copy + Add<Output = T>,
{
    let outer: usize = dims[..axis].iter().product();
    let len = dims[axis];
    let inner: usize = dims[axis + 1..].iter().product();

    let mut result = vec![zero; outer * inner];
    for o in 0..outer {
        for a in 0..len {
            let base = (o * len + a) * inner;
            for i in 0..inner {
                result[o * inner + i] = result[o * inner + i] + data[base + i];
            }
        }
    }
    result
}

/// Dtype of a sum: booleans count as `int32`.
fn sum_dtype(dtype: DType) -> DType {
    if dtype == DType::Bool {
        DType::Int32
    } else {
        dtype
    }
}

/// Dtype of a mean: integers average in `float32`.
fn mean_dtype(dtype: DType) -> DType {
    if dtype.is_inexact() {
        dtype
    } else {
        DType::Float32
    }
}

/// Reduce along a specific axis, dividing the sum by `divisor`.
fn reduce_axis(input: &Array, axis: usize, op: Primitive, out_dtype: DType, divisor: f64) -> Array {
    assert!(
        axis < input.ndim(),
        "Axis {} out of bounds for array with {} dimensions",
        axis,
        input.ndim()
    );

    let dims = input.shape().as_slice();
    let mut result_dims = dims.to_vec();
    result_dims.remove(axis);
    let result_shape = Shape::new(result_dims);

    let result = if input.dtype().is_complex() {
        let data = sum_axis_data(&input.to_complex_vec(), dims, axis, Complex::new(0.0, 0.0));
        let data = data.into_iter().map(|z| z / divisor).collect();
        Array::from_complex_data(data, result_shape, out_dtype)
    } else {
        let data = sum_axis_data(&input.to_vec(), dims, axis, 0.0);
        let data = data.into_iter().map(|x| x / divisor).collect();
        Array::from_real_data(data, result_shape, out_dtype)
    };

    if is_tracing() {
        trace_unary(op, input, &result);
    }

    result
}

/// Reduce over all elements to a 0-dimensional array.
fn reduce_all(input: &Array, op: Primitive, out_dtype: DType, divisor: f64) -> Array {
    let result = if input.dtype().is_complex() {
        let total: Complex<f64> = input.to_complex_vec().into_iter().sum();
        Array::from_complex_data(vec![total / divisor], Shape::scalar(), out_dtype)
    } else {
        let total: f64 = input.to_vec().into_iter().sum();
        Array::from_real_data(vec![total / divisor], Shape::scalar(), out_dtype)
    };

    if is_tracing() {
        trace_unary(op, input, &result);
    }

    result
}

impl Array {
    /// Sum of all elements, as a 0-dimensional array.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, Shape};
    /// let a = Array::from_vec(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![4]));
    /// let sum = a.sum_all();
    /// assert!(sum.is_scalar());
    /// assert_eq!(sum.item(), Some(10.0));
    /// ```
    pub fn sum_all(&self) -> Array {
        reduce_all(self, Primitive::SumAll, sum_dtype(self.dtype()), 1.0)
    }

    /// Sum along a specific axis.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, Shape};
    /// let a = Array::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
    /// let sum_axis0 = a.sum(0);
    /// assert_eq!(sum_axis0.to_vec(), vec![5.0, 7.0, 9.0]);
    /// let sum_axis1 = a.sum(1);
    /// assert_eq!(sum_axis1.to_vec(), vec![6.0, 15.0]);
    /// ```
    pub fn sum(&self, axis: usize) -> Array {
        reduce_axis(self, axis, Primitive::Sum { axis }, sum_dtype(self.dtype()), 1.0)
    }

    /// Mean of all elements, as a 0-dimensional array.
    ///
    /// The mean of an empty array is NaN.
    pub fn mean_all(&self) -> Array {
        reduce_all(self, Primitive::MeanAll, mean_dtype(self.dtype()), self.size() as f64)
    }

    /// Mean along a specific axis.
    pub fn mean(&self, axis: usize) -> Array {
        let len = self.shape().get(axis).unwrap_or(1) as f64;
        reduce_axis(self, axis, Primitive::Mean { axis }, mean_dtype(self.dtype()), len)
    }
}
