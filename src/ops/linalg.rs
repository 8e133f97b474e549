//! Linear algebra and axis-permutation operations.

use crate::trace::{is_tracing, trace_binary, trace_unary, Primitive};
use crate::{Array, DType, Shape};
use num_complex::Complex;
use std::ops::{Add, Mul};

/// Naive `(m, k) @ (k, n)` product of row-major data.
fn matmul_data<T>(a: &[T], b: &[T], m: usize, k: usize, n: usize, zero: T) -> Vec<T>
where
    T: Copy + Add<Output = T> + Mul<Output = T>,
{
    let mut result = vec![zero; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = zero;
            for p in 0..k {
                sum = sum + a[i * k + p] * b[p * n + j];
            }
            result[i * n + j] = sum;
        }
    }
    result
}

/// Gather `data` into the layout obtained by permuting axes.
fn permute_data<T: Copy>(data: &[T], old_shape: &Shape, axes: &[usize], new_shape: &Shape) -> Vec<T> {
    let old_strides = old_shape.default_strides();
    let new_dims = new_shape.as_slice();

    (0..new_shape.size())
        .map(|flat_idx| {
            let mut idx = flat_idx;
            let mut src = 0;
            for i in (0..new_dims.len()).rev() {
                let coord = idx % new_dims[i];
                idx /= new_dims[i];
                src += coord * old_strides[axes[i]];
            }
            data[src]
        })
        .collect()
}

impl Array {
    /// Matrix multiplication.
    ///
    /// Supports `(m, k) @ (k, n)`, vector-matrix, matrix-vector and
    /// vector-vector products. One-dimensional operands are promoted to
    /// matrices through reshapes.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, Shape};
    /// let a = Array::from_vec(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
    /// let b = Array::from_vec(vec![5.0, 6.0, 7.0, 8.0], Shape::new(vec![2, 2]));
    /// assert_eq!(a.matmul(&b).to_vec(), vec![19.0, 22.0, 43.0, 50.0]);
    /// ```
    pub fn matmul(&self, other: &Array) -> Array {
        let a_shape = self.shape().as_slice().to_vec();
        let b_shape = other.shape().as_slice().to_vec();

        match (a_shape.len(), b_shape.len()) {
            (1, 1) => {
                assert_eq!(a_shape[0], b_shape[0], "Vector dot product: incompatible shapes");
                return self
                    .reshape(Shape::new(vec![1, a_shape[0]]))
                    .matmul(&other.reshape(Shape::new(vec![b_shape[0], 1])))
                    .reshape(Shape::scalar());
            }
            (1, 2) => {
                // (k,) @ (k, n) -> (n,)
                assert_eq!(a_shape[0], b_shape[0], "Vector-matrix multiplication: incompatible shapes");
                return self
                    .reshape(Shape::new(vec![1, a_shape[0]]))
                    .matmul(other)
                    .reshape(Shape::new(vec![b_shape[1]]));
            }
            (2, 1) => {
                // (m, k) @ (k,) -> (m,)
                assert_eq!(a_shape[1], b_shape[0], "Matrix-vector multiplication: incompatible shapes");
                return self
                    .matmul(&other.reshape(Shape::new(vec![b_shape[0], 1])))
                    .reshape(Shape::new(vec![a_shape[0]]));
            }
            (2, 2) => {}
            _ => panic!(
                "matmul supports only 1D and 2D operands, got {} @ {}",
                self.shape(),
                other.shape()
            ),
        }

        assert_eq!(
            a_shape[1], b_shape[0],
            "Incompatible shapes for matmul: {:?} @ {:?}",
            a_shape, b_shape
        );
        let (m, k, n) = (a_shape[0], a_shape[1], b_shape[1]);
        let out_shape = Shape::new(vec![m, n]);
        let dtype = DType::promote(self.dtype(), other.dtype());

        let result = if dtype.is_complex() {
            let data = matmul_data(
                &self.to_complex_vec(),
                &other.to_complex_vec(),
                m,
                k,
                n,
                Complex::new(0.0, 0.0),
            );
            Array::from_complex_data(data, out_shape, dtype)
        } else {
            let data = matmul_data(&self.to_vec(), &other.to_vec(), m, k, n, 0.0);
            Array::from_real_data(data, out_shape, dtype)
        };

        if is_tracing() {
            trace_binary(Primitive::Matmul, self, other, &result);
        }
        result
    }

    /// Dot product of two 1D arrays.
    pub fn dot(&self, other: &Array) -> Array {
        assert_eq!(self.ndim(), 1, "dot requires 1D arrays");
        self.matmul(other)
    }

    /// Permute the axes of an array: axis `i` of the result is axis
    /// `axes[i]` of the input.
    ///
    /// # Panics
    ///
    /// Panics if `axes` is not a permutation of `0..ndim`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, Shape};
    /// let a = Array::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
    /// let t = a.permute(&[1, 0]);
    /// assert_eq!(t.shape().as_slice(), &[3, 2]);
    /// assert_eq!(t.to_vec(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    /// ```
    pub fn permute(&self, axes: &[usize]) -> Array {
        let ndim = self.ndim();
        assert_eq!(axes.len(), ndim, "axes must have same length as dimensions");
        let mut seen = vec![false; ndim];
        for &axis in axes {
            assert!(axis < ndim, "axis {} out of bounds for {} dimensions", axis, ndim);
            assert!(!seen[axis], "duplicate axis in permutation");
            seen[axis] = true;
        }

        let dims = self.shape().as_slice();
        let new_shape = Shape::new(axes.iter().map(|&a| dims[a]).collect());

        let result = if self.dtype().is_complex() {
            let data = permute_data(&self.to_complex_vec(), self.shape(), axes, &new_shape);
            Array::from_complex_data(data, new_shape, self.dtype())
        } else {
            let data = permute_data(&self.to_vec(), self.shape(), axes, &new_shape);
            Array::from_real_data(data, new_shape, self.dtype())
        };

        if is_tracing() {
            trace_unary(Primitive::Permute { axes: axes.to_vec() }, self, &result);
        }
        result
    }

    /// Reverse the order of the axes.
    pub fn transpose(&self) -> Array {
        let axes: Vec<usize> = (0..self.ndim()).rev().collect();
        self.permute(&axes)
    }
}
