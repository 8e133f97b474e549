//! Binary operations on arrays.

use crate::trace::{is_tracing, trace_binary, trace_unary, Primitive};
use crate::{Array, DType, Shape};
use num_complex::Complex;

/// Apply a binary function element-wise to two arrays with broadcasting.
///
/// Operands are promoted to `out_dtype`'s domain: complex kernels run when
/// either side is complex, real kernels otherwise.
fn binary_op<R, C>(lhs: &Array, rhs: &Array, op: Primitive, out_dtype: DType, real: R, complex: C) -> Array
where
    R: Fn(f64, f64) -> f64,
    C: Fn(Complex<f64>, Complex<f64>) -> Complex<f64>,
{
    let result_shape = lhs.shape().broadcast_with(rhs.shape()).unwrap_or_else(|| {
        panic!("Shapes {} and {} are not broadcast-compatible", lhs.shape(), rhs.shape())
    });

    let result = if lhs.dtype().is_complex() || rhs.dtype().is_complex() {
        let data = broadcast_binary(
            &lhs.to_complex_vec(),
            lhs.shape(),
            &rhs.to_complex_vec(),
            rhs.shape(),
            &result_shape,
            complex,
        );
        Array::from_complex_data(data, result_shape, out_dtype)
    } else {
        let data =
            broadcast_binary(&lhs.to_vec(), lhs.shape(), &rhs.to_vec(), rhs.shape(), &result_shape, real);
        Array::from_real_data(data, result_shape, out_dtype)
    };

    if is_tracing() {
        trace_binary(op, lhs, rhs, &result);
    }
    result
}

/// Element-wise combination with broadcasting.
fn broadcast_binary<T, F>(
    lhs_data: &[T],
    lhs_shape: &Shape,
    rhs_data: &[T],
    rhs_shape: &Shape,
    result_shape: &Shape,
    f: F,
) -> Vec<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    if lhs_shape == rhs_shape {
        return lhs_data.iter().zip(rhs_data).map(|(&a, &b)| f(a, b)).collect();
    }

    (0..result_shape.size())
        .map(|i| {
            let lhs_idx = broadcast_index(i, result_shape, lhs_shape);
            let rhs_idx = broadcast_index(i, result_shape, rhs_shape);
            f(lhs_data[lhs_idx], rhs_data[rhs_idx])
        })
        .collect()
}

/// Convert a flat index in the result array to an index in the source array,
/// accounting for broadcasting.
pub(crate) fn broadcast_index(flat_idx: usize, result_shape: &Shape, src_shape: &Shape) -> usize {
    let result_dims = result_shape.as_slice();
    let src_dims = src_shape.as_slice();

    let mut multi_idx = Vec::with_capacity(result_dims.len());
    let mut idx = flat_idx;
    for &dim in result_dims.iter().rev() {
        multi_idx.push(idx % dim);
        idx /= dim;
    }
    multi_idx.reverse();

    let offset = result_dims.len() - src_dims.len();
    let mut src_idx = 0;
    let mut stride = 1;

    for i in (0..src_dims.len()).rev() {
        let dim_idx = if src_dims[i] == 1 { 0 } else { multi_idx[offset + i] };
        src_idx += dim_idx * stride;
        stride *= src_dims[i];
    }

    src_idx
}

/// Division and powers of integers produce floats.
fn true_divide_dtype(lhs: DType, rhs: DType) -> DType {
    let dtype = DType::promote(lhs, rhs);
    if dtype.is_inexact() {
        dtype
    } else {
        DType::Float32
    }
}

impl Array {
    /// Add two arrays element-wise with broadcasting.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, Shape};
    /// let a = Array::from_vec(vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
    /// let b = Array::from_vec(vec![10.0, 20.0, 30.0], Shape::new(vec![3]));
    /// assert_eq!(a.add(&b).to_vec(), vec![11.0, 22.0, 33.0]);
    /// ```
    pub fn add(&self, other: &Array) -> Array {
        let dtype = DType::promote(self.dtype(), other.dtype());
        binary_op(self, other, Primitive::Add, dtype, |a, b| a + b, |a, b| a + b)
    }

    /// Subtract two arrays element-wise with broadcasting.
    pub fn sub(&self, other: &Array) -> Array {
        let dtype = DType::promote(self.dtype(), other.dtype());
        binary_op(self, other, Primitive::Sub, dtype, |a, b| a - b, |a, b| a - b)
    }

    /// Multiply two arrays element-wise with broadcasting.
    pub fn mul(&self, other: &Array) -> Array {
        let dtype = DType::promote(self.dtype(), other.dtype());
        binary_op(self, other, Primitive::Mul, dtype, |a, b| a * b, |a, b| a * b)
    }

    /// Divide two arrays element-wise with broadcasting.
    ///
    /// Integer operands produce a `float32` result.
    pub fn div(&self, other: &Array) -> Array {
        let dtype = true_divide_dtype(self.dtype(), other.dtype());
        binary_op(self, other, Primitive::Div, dtype, |a, b| a / b, |a, b| a / b)
    }

    /// Raise `self` to the power `other`, element-wise with broadcasting.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, Shape};
    /// let x = Array::from_vec_f64(vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
    /// let y = x.pow(&Array::from_vec_f64(vec![2.0], Shape::new(vec![1])));
    /// assert_eq!(y.to_vec(), vec![1.0, 4.0, 9.0]);
    /// ```
    pub fn pow(&self, other: &Array) -> Array {
        let dtype = true_divide_dtype(self.dtype(), other.dtype());
        binary_op(self, other, Primitive::Pow, dtype, f64::powf, |a, b| a.powc(b))
    }

    /// Raise every element to a constant power.
    pub fn powf(&self, exponent: f64) -> Array {
        self.pow(&Array::scalar(exponent, self.dtype().to_real()))
    }

    /// Multiply every element by a constant.
    ///
    /// Integer arrays are scaled in `float32`.
    pub fn scale(&self, factor: f64) -> Array {
        self.mul(&Array::scalar(factor, DType::promote(self.dtype(), DType::Float32)))
    }

    /// Broadcast the array to `shape` following NumPy rules.
    ///
    /// # Panics
    ///
    /// Panics if the array cannot be broadcast to `shape`.
    pub fn broadcast_to(&self, shape: &Shape) -> Array {
        let compatible = self.ndim() <= shape.ndim()
            && self.shape().broadcast_with(shape).as_ref() == Some(shape);
        assert!(compatible, "Cannot broadcast array of shape {} to {}", self.shape(), shape);

        let size = shape.size();
        let gather = |i| broadcast_index(i, shape, self.shape());
        let result = if self.dtype().is_complex() {
            let data = self.to_complex_vec();
            let out = (0..size).map(|i| data[gather(i)]).collect();
            Array::from_complex_data(out, shape.clone(), self.dtype())
        } else {
            let data = self.to_vec();
            let out = (0..size).map(|i| data[gather(i)]).collect();
            Array::from_real_data(out, shape.clone(), self.dtype())
        };

        if is_tracing() {
            trace_unary(Primitive::BroadcastTo { shape: shape.as_slice().to_vec() }, self, &result);
        }
        result
    }
}
