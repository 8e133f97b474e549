//! Buffer abstraction for array data storage.

use crate::DType;
use num_complex::Complex;
use std::sync::Arc;

/// Raw data buffer for array storage.
///
/// Buffers are reference-counted and shared between arrays that are
/// reshapes or retagged copies of each other. Real dtypes (floats, ints and
/// bool) are held as `f64` already rounded to the dtype; complex dtypes as
/// `Complex<f64>`. `float0` buffers record a length and hold nothing.
#[derive(Debug, Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

#[derive(Debug)]
enum BufferInner {
    Real { data: Vec<f64>, dtype: DType },
    Complex { data: Vec<Complex<f64>>, dtype: DType },
    Float0 { len: usize },
}

impl Buffer {
    /// Create a new buffer filled with zeros.
    pub fn zeros(len: usize, dtype: DType) -> Self {
        Self::filled(0.0, len, dtype)
    }

    /// Create a new buffer filled with a specific value.
    pub fn filled(value: f64, len: usize, dtype: DType) -> Self {
        match dtype {
            DType::Float0 => Self::float0(len),
            d if d.is_complex() => Self::from_complex(vec![Complex::new(value, 0.0); len], d),
            d => Self::from_real(vec![value; len], d),
        }
    }

    /// Create a `float0` buffer of `len` (absent) elements.
    pub fn float0(len: usize) -> Self {
        Self { inner: Arc::new(BufferInner::Float0 { len }) }
    }

    /// Create a buffer from real values, rounding them to `dtype`.
    ///
    /// A complex `dtype` stores the values with a zero imaginary part.
    pub fn from_real(data: Vec<f64>, dtype: DType) -> Self {
        if dtype == DType::Float0 {
            return Self::float0(data.len());
        }
        if dtype.is_complex() {
            let data = data.into_iter().map(|re| Complex::new(re, 0.0)).collect();
            return Self::from_complex(data, dtype);
        }
        let data = if dtype == DType::Float64 {
            data
        } else {
            data.into_iter().map(|x| dtype.cast_real(x)).collect()
        };
        Self { inner: Arc::new(BufferInner::Real { data, dtype }) }
    }

    /// Create a buffer from complex values, rounding them to `dtype`.
    ///
    /// A real `dtype` keeps only the real parts.
    pub fn from_complex(data: Vec<Complex<f64>>, dtype: DType) -> Self {
        if !dtype.is_complex() {
            return Self::from_real(data.into_iter().map(|z| z.re).collect(), dtype);
        }
        let data = if dtype == DType::Complex64 {
            data.into_iter()
                .map(|z| Complex::new(dtype.cast_real(z.re), dtype.cast_real(z.im)))
                .collect()
        } else {
            data
        };
        Self { inner: Arc::new(BufferInner::Complex { data, dtype }) }
    }

    /// Data type of the stored elements.
    pub fn dtype(&self) -> DType {
        match self.inner.as_ref() {
            BufferInner::Real { dtype, .. } | BufferInner::Complex { dtype, .. } => *dtype,
            BufferInner::Float0 { .. } => DType::Float0,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self.inner.as_ref() {
            BufferInner::Real { data, .. } => data.len(),
            BufferInner::Complex { data, .. } => data.len(),
            BufferInner::Float0 { len } => *len,
        }
    }

    /// Returns true if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the real data, if this is a real buffer.
    pub fn as_real(&self) -> Option<&[f64]> {
        match self.inner.as_ref() {
            BufferInner::Real { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Borrow the complex data, if this is a complex buffer.
    pub fn as_complex(&self) -> Option<&[Complex<f64>]> {
        match self.inner.as_ref() {
            BufferInner::Complex { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Copy out real values. Complex buffers yield their real parts,
    /// `float0` buffers yield zeros.
    pub fn to_real_vec(&self) -> Vec<f64> {
        match self.inner.as_ref() {
            BufferInner::Real { data, .. } => data.clone(),
            BufferInner::Complex { data, .. } => data.iter().map(|z| z.re).collect(),
            BufferInner::Float0 { len } => vec![0.0; *len],
        }
    }

    /// Copy out values as complex numbers.
    pub fn to_complex_vec(&self) -> Vec<Complex<f64>> {
        match self.inner.as_ref() {
            BufferInner::Real { data, .. } => data.iter().map(|&re| Complex::new(re, 0.0)).collect(),
            BufferInner::Complex { data, .. } => data.clone(),
            BufferInner::Float0 { len } => vec![Complex::new(0.0, 0.0); *len],
        }
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        match (self.inner.as_ref(), other.inner.as_ref()) {
            (
                BufferInner::Real { data: a, dtype: da },
                BufferInner::Real { data: b, dtype: db },
            ) => da == db && a == b,
            (
                BufferInner::Complex { data: a, dtype: da },
                BufferInner::Complex { data: b, dtype: db },
            ) => da == db && a == b,
            (BufferInner::Float0 { len: a }, BufferInner::Float0 { len: b }) => a == b,
            _ => false,
        }
    }
}
