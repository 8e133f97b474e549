//! Data type definitions and utilities.

use std::fmt;

/// Numerical data type for array contents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
    /// Complex number with two 32-bit float parts
    Complex64,
    /// Complex number with two 64-bit float parts
    Complex128,
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    Uint8,
    /// 16-bit unsigned integer
    Uint16,
    /// 32-bit unsigned integer
    Uint32,
    /// 64-bit unsigned integer
    Uint64,
    /// Boolean
    Bool,
    /// Zero-sized tangent dtype of integer and boolean primals.
    ///
    /// An array of this dtype has a shape but holds no data: it marks a leaf
    /// that contributes no derivative.
    Float0,
}

impl DType {
    /// Returns the byte width of a single element of this dtype.
    #[inline]
    pub const fn byte_width(self) -> usize {
        match self {
            DType::Float0 => 0,
            DType::Bool | DType::Int8 | DType::Uint8 => 1,
            DType::Int16 | DType::Uint16 => 2,
            DType::Float32 | DType::Int32 | DType::Uint32 => 4,
            DType::Float64 | DType::Int64 | DType::Uint64 | DType::Complex64 => 8,
            DType::Complex128 => 16,
        }
    }

    /// Returns true if this is a real floating-point dtype.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    /// Returns true if this is a complex dtype.
    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, DType::Complex64 | DType::Complex128)
    }

    /// Returns true for dtypes that admit a meaningful tangent direction
    /// (real floating point and complex).
    #[inline]
    pub const fn is_inexact(self) -> bool {
        self.is_float() || self.is_complex()
    }

    /// Returns true if this is an integer dtype.
    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(
            self,
            DType::Int8
                | DType::Int16
                | DType::Int32
                | DType::Int64
                | DType::Uint8
                | DType::Uint16
                | DType::Uint32
                | DType::Uint64
        )
    }

    /// Returns true if values of this dtype are stored at single precision.
    #[inline]
    pub const fn is_single_precision(self) -> bool {
        matches!(self, DType::Float32 | DType::Complex64)
    }

    /// The dtype of tangents paired with primals of this dtype.
    ///
    /// Inexact dtypes are their own tangent dtype; integers, booleans and
    /// `float0` itself map to [`DType::Float0`].
    ///
    /// ```
    /// # use jax_jacfwd::DType;
    /// assert_eq!(DType::Float32.tangent_dtype(), DType::Float32);
    /// assert_eq!(DType::Complex128.tangent_dtype(), DType::Complex128);
    /// assert_eq!(DType::Int32.tangent_dtype(), DType::Float0);
    /// assert_eq!(DType::Bool.tangent_dtype(), DType::Float0);
    /// ```
    #[inline]
    pub const fn tangent_dtype(self) -> DType {
        if self.is_inexact() {
            self
        } else {
            DType::Float0
        }
    }

    /// The complex dtype with the same precision as this one.
    pub const fn to_complex(self) -> DType {
        match self {
            DType::Float32 | DType::Complex64 => DType::Complex64,
            _ => DType::Complex128,
        }
    }

    /// The real dtype with the same precision as this one.
    ///
    /// Used for `abs`, `real` and `imag` of complex arrays.
    pub const fn to_real(self) -> DType {
        match self {
            DType::Complex64 => DType::Float32,
            DType::Complex128 => DType::Float64,
            other => other,
        }
    }

    /// Promotes two dtypes for a binary operation.
    ///
    /// Type lattice: `bool -> uint8 -> ... -> uint64 -> int8 -> ... -> int64
    /// -> float32 -> float64 -> complex64 -> complex128`. Mixing a double
    /// precision real with a single precision complex gives `complex128`.
    /// `float0` only arises as a tangent dtype and promotes to the other side.
    ///
    /// ```
    /// # use jax_jacfwd::DType;
    /// assert_eq!(DType::promote(DType::Bool, DType::Int32), DType::Int32);
    /// assert_eq!(DType::promote(DType::Int32, DType::Float32), DType::Float32);
    /// assert_eq!(DType::promote(DType::Float64, DType::Complex64), DType::Complex128);
    /// ```
    pub fn promote(dtype1: DType, dtype2: DType) -> DType {
        if dtype1 == dtype2 {
            return dtype1;
        }
        if dtype1 == DType::Float0 {
            return dtype2;
        }
        if dtype2 == DType::Float0 {
            return dtype1;
        }

        if dtype1.is_complex() || dtype2.is_complex() {
            let single = |d: DType| d.is_single_precision() || !d.is_inexact();
            return if single(dtype1) && single(dtype2) {
                DType::Complex64
            } else {
                DType::Complex128
            };
        }

        let rank = |d: DType| match d {
            DType::Bool => 0,
            DType::Uint8 => 1,
            DType::Uint16 => 2,
            DType::Uint32 => 3,
            DType::Uint64 => 4,
            DType::Int8 => 5,
            DType::Int16 => 6,
            DType::Int32 => 7,
            DType::Int64 => 8,
            DType::Float32 => 9,
            DType::Float64 => 10,
            DType::Complex64 => 11,
            DType::Complex128 => 12,
            DType::Float0 => 13,
        };

        if rank(dtype1) > rank(dtype2) {
            dtype1
        } else {
            dtype2
        }
    }

    /// Round a real value to what this dtype can represent.
    #[inline]
    pub fn cast_real(self, value: f64) -> f64 {
        match self {
            DType::Float64 | DType::Complex128 => value,
            DType::Float32 | DType::Complex64 => value as f32 as f64,
            DType::Int8 => (value as i8) as f64,
            DType::Int16 => (value as i16) as f64,
            DType::Int32 => (value as i32) as f64,
            DType::Int64 => (value as i64) as f64,
            DType::Uint8 => (value as u8) as f64,
            DType::Uint16 => (value as u16) as f64,
            DType::Uint32 => (value as u32) as f64,
            DType::Uint64 => (value as u64) as f64,
            DType::Bool => {
                if value != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            DType::Float0 => 0.0,
        }
    }

    /// Parse a string into a DType.
    pub fn from_name(s: &str) -> Option<DType> {
        match s.to_lowercase().as_str() {
            "float32" | "f32" => Some(DType::Float32),
            "float64" | "f64" => Some(DType::Float64),
            "complex64" | "c64" => Some(DType::Complex64),
            "complex128" | "c128" => Some(DType::Complex128),
            "int8" | "i8" => Some(DType::Int8),
            "int16" | "i16" => Some(DType::Int16),
            "int32" | "i32" => Some(DType::Int32),
            "int64" | "i64" => Some(DType::Int64),
            "uint8" | "u8" => Some(DType::Uint8),
            "uint16" | "u16" => Some(DType::Uint16),
            "uint32" | "u32" => Some(DType::Uint32),
            "uint64" | "u64" => Some(DType::Uint64),
            "bool" => Some(DType::Bool),
            "float0" => Some(DType::Float0),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Uint8 => "uint8",
            DType::Uint16 => "uint16",
            DType::Uint32 => "uint32",
            DType::Uint64 => "uint64",
            DType::Bool => "bool",
            DType::Float0 => "float0",
        };
        f.write_str(name)
    }
}
