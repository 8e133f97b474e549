//! Unary operations on arrays.

use crate::trace::{is_tracing, trace_unary, Primitive};
use crate::{Array, DType};
use num_complex::Complex;

#[cfg(test)]
use crate::Shape;

/// Apply a unary function element-wise to an array.
///
/// `real` runs on real inputs and `complex` on complex ones; the result is
/// stored as `out_dtype`.
fn unary_op<R, C>(input: &Array, op: Primitive, out_dtype: DType, real: R, complex: C) -> Array
where
    R: Fn(f64) -> f64,
    C: Fn(Complex<f64>) -> Complex<f64>,
{
    let shape = input.shape().clone();
    let result = if input.dtype().is_complex() {
        let data = input.to_complex_vec().into_iter().map(complex).collect();
        Array::from_complex_data(data, shape, out_dtype)
    } else {
        let data = input.to_vec().into_iter().map(real).collect();
        Array::from_real_data(data, shape, out_dtype)
    };

    if is_tracing() {
        trace_unary(op, input, &result);
    }

    result
}

/// Result dtype of transcendental functions: integers compute in `float32`.
fn float_dtype(dtype: DType) -> DType {
    if dtype.is_inexact() {
        dtype
    } else {
        DType::Float32
    }
}

fn sign_real(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x
    }
}

impl Array {
    /// Negate the array element-wise.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, Shape};
    /// let a = Array::from_vec(vec![1.0, -2.0, 3.0], Shape::new(vec![3]));
    /// let b = a.neg();
    /// assert_eq!(b.to_vec(), vec![-1.0, 2.0, -3.0]);
    /// ```
    pub fn neg(&self) -> Array {
        unary_op(self, Primitive::Neg, self.dtype(), |x| -x, |z| -z)
    }

    /// Absolute value element-wise. Complex inputs give their real modulus.
    pub fn abs(&self) -> Array {
        let dtype = self.dtype().to_real();
        unary_op(self, Primitive::Abs, dtype, f64::abs, |z| Complex::new(z.norm(), 0.0))
    }

    /// Sign element-wise: -1, 0 or 1 for reals, `z / |z|` for complex.
    pub fn sign(&self) -> Array {
        unary_op(self, Primitive::Sign, self.dtype(), sign_real, |z| {
            if z.norm() == 0.0 {
                z
            } else {
                z / z.norm()
            }
        })
    }

    /// Sine element-wise.
    pub fn sin(&self) -> Array {
        unary_op(self, Primitive::Sin, float_dtype(self.dtype()), f64::sin, |z| z.sin())
    }

    /// Cosine element-wise.
    pub fn cos(&self) -> Array {
        unary_op(self, Primitive::Cos, float_dtype(self.dtype()), f64::cos, |z| z.cos())
    }

    /// Hyperbolic tangent element-wise.
    pub fn tanh(&self) -> Array {
        unary_op(self, Primitive::Tanh, float_dtype(self.dtype()), f64::tanh, |z| z.tanh())
    }

    /// Exponential element-wise.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, Shape};
    /// let a = Array::from_vec_f64(vec![0.0, 1.0], Shape::new(vec![2]));
    /// assert_eq!(a.exp().to_vec(), vec![1.0, std::f64::consts::E]);
    /// ```
    pub fn exp(&self) -> Array {
        unary_op(self, Primitive::Exp, float_dtype(self.dtype()), f64::exp, |z| z.exp())
    }

    /// Natural logarithm element-wise.
    pub fn log(&self) -> Array {
        unary_op(self, Primitive::Log, float_dtype(self.dtype()), f64::ln, |z| z.ln())
    }

    /// Square root element-wise.
    pub fn sqrt(&self) -> Array {
        unary_op(self, Primitive::Sqrt, float_dtype(self.dtype()), f64::sqrt, |z| z.sqrt())
    }

    /// Square element-wise.
    pub fn square(&self) -> Array {
        unary_op(self, Primitive::Square, self.dtype(), |x| x * x, |z| z * z)
    }

    /// Reciprocal (1/x) element-wise.
    pub fn reciprocal(&self) -> Array {
        unary_op(self, Primitive::Reciprocal, float_dtype(self.dtype()), f64::recip, |z| z.inv())
    }

    /// Real part. Real arrays are returned unchanged.
    pub fn real(&self) -> Array {
        let dtype = self.dtype().to_real();
        unary_op(self, Primitive::Real, dtype, |x| x, |z| Complex::new(z.re, 0.0))
    }

    /// Imaginary part. Real arrays give zeros.
    pub fn imag(&self) -> Array {
        let dtype = self.dtype().to_real();
        unary_op(self, Primitive::Imag, dtype, |_| 0.0, |z| Complex::new(z.im, 0.0))
    }

    /// Complex conjugate. Real arrays are returned unchanged.
    pub fn conj(&self) -> Array {
        unary_op(self, Primitive::Conj, self.dtype(), |x| x, |z| z.conj())
    }
}
