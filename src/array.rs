//! Core Array type for n-dimensional numeric arrays.

use crate::trace::{is_tracing, trace_unary, Primitive};
use crate::{buffer::Buffer, DType, Shape};
use num_complex::Complex;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Global counter for generating unique array IDs
static ARRAY_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Generate a unique ID for an array
fn next_array_id() -> usize {
    ARRAY_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A multidimensional numeric array.
///
/// Arrays are immutable, row-major and live in CPU memory. Every operation
/// returns a new array with a fresh id; while a trace is active the
/// operation is also recorded so its tangent can be propagated later.
///
/// # Memory Model
///
/// Arrays own their data through a reference-counted [`Buffer`], so cloning
/// and reshaping are cheap. A clone keeps the id of the original.
///
/// # Examples
///
/// ```
/// # use jax_jacfwd::{Array, DType, Shape};
/// let a = Array::zeros(Shape::new(vec![2, 3]), DType::Float32);
/// assert_eq!(a.shape().as_slice(), &[2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct Array {
    /// Underlying data buffer
    buffer: Buffer,
    /// Shape of the array
    shape: Shape,
    /// Unique ID used by the tracer
    id: usize,
}

impl Array {
    fn from_buffer(buffer: Buffer, shape: Shape) -> Self {
        debug_assert_eq!(buffer.len(), shape.size());
        Self { buffer, shape, id: next_array_id() }
    }

    /// Create a new array filled with zeros.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, DType, Shape};
    /// let a = Array::zeros(Shape::new(vec![2, 3]), DType::Float32);
    /// assert_eq!(a.dtype(), DType::Float32);
    /// assert!(a.to_vec().iter().all(|&x| x == 0.0));
    /// ```
    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        Self::from_buffer(Buffer::zeros(shape.size(), dtype), shape)
    }

    /// Create a new array filled with ones.
    pub fn ones(shape: Shape, dtype: DType) -> Self {
        Self::full(1.0, shape, dtype)
    }

    /// Create a new array filled with a specific value.
    pub fn full(value: f64, shape: Shape, dtype: DType) -> Self {
        Self::from_buffer(Buffer::filled(value, shape.size(), dtype), shape)
    }

    /// Create a 0-dimensional array.
    pub fn scalar(value: f64, dtype: DType) -> Self {
        Self::full(value, Shape::scalar(), dtype)
    }

    /// Create a `float32` array from a flat `Vec<f32>` and shape.
    ///
    /// # Panics
    ///
    /// Panics if the shape size doesn't match the data length.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, Shape};
    /// let a = Array::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
    /// assert_eq!(a.shape().as_slice(), &[2, 3]);
    /// ```
    pub fn from_vec(data: Vec<f32>, shape: Shape) -> Self {
        let data = data.into_iter().map(f64::from).collect();
        Self::from_real_data(data, shape, DType::Float32)
    }

    /// Create a `float64` array.
    pub fn from_vec_f64(data: Vec<f64>, shape: Shape) -> Self {
        Self::from_real_data(data, shape, DType::Float64)
    }

    /// Create an `int32` array.
    pub fn from_vec_i32(data: Vec<i32>, shape: Shape) -> Self {
        let data = data.into_iter().map(f64::from).collect();
        Self::from_real_data(data, shape, DType::Int32)
    }

    /// Create a `bool` array.
    pub fn from_vec_bool(data: Vec<bool>, shape: Shape) -> Self {
        let data = data.into_iter().map(|b| if b { 1.0 } else { 0.0 }).collect();
        Self::from_real_data(data, shape, DType::Bool)
    }

    /// Create a `complex128` array.
    pub fn from_complex(data: Vec<Complex<f64>>, shape: Shape) -> Self {
        Self::from_complex_data(data, shape, DType::Complex128)
    }

    /// Create an array of any dtype from real values, rounding them to `dtype`.
    ///
    /// # Panics
    ///
    /// Panics if the shape size doesn't match the data length.
    pub fn from_real_data(data: Vec<f64>, shape: Shape, dtype: DType) -> Self {
        assert_eq!(data.len(), shape.size(), "Data length must match shape size");
        Self::from_buffer(Buffer::from_real(data, dtype), shape)
    }

    /// Create an array of any dtype from complex values.
    ///
    /// A real `dtype` keeps only the real parts.
    ///
    /// # Panics
    ///
    /// Panics if the shape size doesn't match the data length.
    pub fn from_complex_data(data: Vec<Complex<f64>>, shape: Shape, dtype: DType) -> Self {
        assert_eq!(data.len(), shape.size(), "Data length must match shape size");
        Self::from_buffer(Buffer::from_complex(data, dtype), shape)
    }

    /// Get the shape of the array.
    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Get the data type of the array.
    #[inline]
    pub fn dtype(&self) -> DType {
        self.buffer.dtype()
    }

    /// Get the number of dimensions.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Get the total number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// Get the unique ID of this array (for tracing).
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Check if this is a scalar (0-dimensional array).
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.shape.is_scalar()
    }

    /// Copy of this array that shares its data but has a fresh id.
    ///
    /// The tracer keys values by id; inputs are retagged so that two
    /// arguments cloned from the same array still trace as distinct inputs.
    pub(crate) fn retag(&self) -> Array {
        Self { buffer: self.buffer.clone(), shape: self.shape.clone(), id: next_array_id() }
    }

    /// Copy data to a `Vec<f64>` in row-major order.
    ///
    /// Complex arrays yield their real parts; `float0` arrays yield zeros.
    pub fn to_vec(&self) -> Vec<f64> {
        self.buffer.to_real_vec()
    }

    /// Copy data to a vector of complex numbers in row-major order.
    pub fn to_complex_vec(&self) -> Vec<Complex<f64>> {
        self.buffer.to_complex_vec()
    }

    /// The single element of a one-element array, as a real number.
    pub fn item(&self) -> Option<f64> {
        if self.size() == 1 {
            self.to_vec().first().copied()
        } else {
            None
        }
    }

    /// Cast array to a different dtype.
    ///
    /// Casting complex to real keeps the real part.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, DType, Shape};
    /// let a = Array::from_vec(vec![1.0, 2.5, 3.9], Shape::new(vec![3]));
    /// let b = a.astype(DType::Int32);
    /// assert_eq!(b.dtype(), DType::Int32);
    /// assert_eq!(b.to_vec(), vec![1.0, 2.0, 3.0]);
    /// ```
    pub fn astype(&self, dtype: DType) -> Self {
        let result = if self.dtype().is_complex() {
            Self::from_complex_data(self.to_complex_vec(), self.shape.clone(), dtype)
        } else {
            Self::from_real_data(self.to_vec(), self.shape.clone(), dtype)
        };

        if is_tracing() {
            trace_unary(Primitive::Convert { dtype }, self, &result);
        }
        result
    }

    /// Reshape the array to a new shape.
    ///
    /// # Panics
    ///
    /// Panics if the total size doesn't match.
    pub fn reshape(&self, new_shape: Shape) -> Self {
        assert_eq!(
            self.shape.size(),
            new_shape.size(),
            "Cannot reshape array of size {} into shape of size {}",
            self.shape.size(),
            new_shape.size()
        );
        let result = Self::from_buffer(self.buffer.clone(), new_shape.clone());

        if is_tracing() {
            trace_unary(Primitive::Reshape { new_shape: new_shape.as_slice().to_vec() }, self, &result);
        }
        result
    }

    /// Expand the shape of an array by inserting a new axis of length one.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jax_jacfwd::{Array, Shape};
    /// let a = Array::from_vec(vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
    /// assert_eq!(a.expand_dims(0).shape().as_slice(), &[1, 3]);
    /// assert_eq!(a.expand_dims(1).shape().as_slice(), &[3, 1]);
    /// ```
    pub fn expand_dims(&self, axis: usize) -> Self {
        let mut new_dims = self.shape.as_slice().to_vec();
        assert!(
            axis <= new_dims.len(),
            "Axis {} out of bounds for array with {} dimensions",
            axis,
            new_dims.len()
        );
        new_dims.insert(axis, 1);
        self.reshape(Shape::new(new_dims))
    }

    /// Remove axes of length one from the array.
    pub fn squeeze(&self) -> Self {
        let new_dims: Vec<usize> =
            self.shape.as_slice().iter().filter(|&&dim| dim != 1).copied().collect();
        self.reshape(Shape::new(new_dims))
    }

    /// Elements `range` of the trailing axis, keeping that axis.
    ///
    /// Not traced: this is batching plumbing, not a differentiable op.
    pub(crate) fn slice_last(&self, range: Range<usize>) -> Array {
        let (lead, len) = self
            .shape
            .split_last()
            .unwrap_or_else(|| panic!("slice_last requires at least one axis, got {}", self.shape));
        assert!(range.end <= len, "Slice {:?} out of bounds for trailing axis of length {}", range, len);

        let width = range.len();
        let shape = lead.with_trailing(width);
        let rows = lead.size();

        if self.dtype() == DType::Float0 {
            return Array::zeros(shape, DType::Float0);
        }
        if self.dtype().is_complex() {
            let data = self.to_complex_vec();
            let out = (0..rows)
                .flat_map(|row| data[row * len + range.start..row * len + range.end].to_vec())
                .collect();
            Self::from_complex_data(out, shape, self.dtype())
        } else {
            let data = self.to_vec();
            let out = (0..rows)
                .flat_map(|row| data[row * len + range.start..row * len + range.end].to_vec())
                .collect();
            Self::from_real_data(out, shape, self.dtype())
        }
    }

    /// Stack equally shaped arrays along a new trailing axis.
    ///
    /// `shape` and `dtype` describe each slice, so that an empty list still
    /// yields an array of shape `shape + (0,)`.
    pub(crate) fn stack_last(slices: &[Array], shape: &Shape, dtype: DType) -> Array {
        let lanes = slices.len();
        let out_shape = shape.with_trailing(lanes);
        for slice in slices {
            assert_eq!(slice.shape(), shape, "All arrays must have the same shape");
        }

        if dtype == DType::Float0 {
            return Array::zeros(out_shape, DType::Float0);
        }
        let rows = shape.size();
        if dtype.is_complex() {
            let columns: Vec<_> = slices.iter().map(Array::to_complex_vec).collect();
            let data = (0..rows)
                .flat_map(|row| columns.iter().map(move |column| column[row]))
                .collect();
            Self::from_complex_data(data, out_shape, dtype)
        } else {
            let columns: Vec<_> = slices.iter().map(Array::to_vec).collect();
            let data = (0..rows)
                .flat_map(|row| columns.iter().map(move |column| column[row]))
                .collect();
            Self::from_real_data(data, out_shape, dtype)
        }
    }
}

impl PartialEq for Array {
    /// Arrays are equal when dtype, shape and every element match.
    /// The tracing id is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.buffer == other.buffer
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array:{}{}", self.dtype(), self.shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_zeros() {
        let a = Array::zeros(Shape::new(vec![2, 3]), DType::Float32);
        assert_eq!(a.shape().as_slice(), &[2, 3]);
        assert_eq!(a.dtype(), DType::Float32);
        assert_eq!(a.size(), 6);
        assert_eq!(a.ndim(), 2);
        assert!(a.to_vec().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_array_full_and_scalar() {
        let a = Array::full(5.0, Shape::new(vec![2, 2]), DType::Float64);
        assert_eq!(a.to_vec(), vec![5.0; 4]);

        let s = Array::scalar(3.0, DType::Float32);
        assert!(s.is_scalar());
        assert_eq!(s.item(), Some(3.0));
    }

    #[test]
    fn test_array_from_vec_typed() {
        let a = Array::from_vec_i32(vec![1, 2, 3], Shape::new(vec![3]));
        assert_eq!(a.dtype(), DType::Int32);
        assert_eq!(a.to_vec(), vec![1.0, 2.0, 3.0]);

        let b = Array::from_vec_bool(vec![true, false], Shape::new(vec![2]));
        assert_eq!(b.dtype(), DType::Bool);
        assert_eq!(b.to_vec(), vec![1.0, 0.0]);

        let c = Array::from_complex(vec![Complex::new(1.0, -1.0)], Shape::new(vec![1]));
        assert_eq!(c.dtype(), DType::Complex128);
        assert_eq!(c.to_complex_vec(), vec![Complex::new(1.0, -1.0)]);
    }

    #[test]
    #[should_panic(expected = "Data length must match shape size")]
    fn test_array_from_vec_size_mismatch() {
        let _a = Array::from_vec(vec![1.0, 2.0], Shape::new(vec![3]));
    }

    #[test]
    fn test_array_reshape_keeps_data() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let a = Array::from_vec_f64(data.clone(), Shape::new(vec![2, 3]));
        let b = a.reshape(Shape::new(vec![3, 2]));
        assert_eq!(b.shape().as_slice(), &[3, 2]);
        assert_eq!(b.to_vec(), data);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    #[should_panic(expected = "Cannot reshape")]
    fn test_array_reshape_size_mismatch() {
        let a = Array::zeros(Shape::new(vec![2, 3]), DType::Float32);
        let _b = a.reshape(Shape::new(vec![2, 2]));
    }

    #[test]
    fn test_squeeze() {
        let a = Array::zeros(Shape::new(vec![1, 3, 1, 4]), DType::Float32);
        assert_eq!(a.squeeze().shape().as_slice(), &[3, 4]);
    }

    #[test]
    fn test_astype() {
        let a = Array::from_vec(vec![0.0, 1.0, 5.0], Shape::new(vec![3]));
        let b = a.astype(DType::Bool);
        assert_eq!(b.dtype(), DType::Bool);
        assert_eq!(b.to_vec(), vec![0.0, 1.0, 1.0]);

        let c = a.astype(DType::Complex64);
        assert_eq!(c.to_complex_vec()[2], Complex::new(5.0, 0.0));
    }

    #[test]
    fn test_retag_and_equality() {
        let a = Array::from_vec(vec![1.0, 2.0], Shape::new(vec![2]));
        let b = a.retag();
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
        assert_eq!(a.clone().id(), a.id());
        assert_ne!(a, a.astype(DType::Float64));
    }

    #[test]
    fn test_slice_and_stack_last() {
        let a = Array::from_vec_f64(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], Shape::new(vec![2, 3]));
        let middle = a.slice_last(1..2);
        assert_eq!(middle.shape().as_slice(), &[2, 1]);
        assert_eq!(middle.to_vec(), vec![1.0, 4.0]);

        let columns: Vec<Array> = (0..3)
            .map(|i| a.slice_last(i..i + 1).reshape(Shape::new(vec![2])))
            .collect();
        let restacked = Array::stack_last(&columns, &Shape::new(vec![2]), DType::Float64);
        assert_eq!(restacked, a);

        let empty = Array::stack_last(&[], &Shape::new(vec![2]), DType::Float32);
        assert_eq!(empty.shape().as_slice(), &[2, 0]);
    }

    #[test]
    fn test_array_display() {
        let a = Array::zeros(Shape::new(vec![2, 3]), DType::Float32);
        assert_eq!(a.to_string(), "Array:float32(2, 3)");
    }
}
