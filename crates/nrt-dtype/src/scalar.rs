use std::sync::Arc;

use num_complex::Complex;

use crate::{DType, Descr, RecordValue, TimeUnit, TypeError};

/// A single typed value. Element reads from arrays produce these, and ufuncs
/// accept them as zero-dimensional operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Complex64(Complex<f32>),
    Complex128(Complex<f64>),
    DateTime64(i64, TimeUnit),
    TimeDelta64(i64, TimeUnit),
    Bytes(Vec<u8>),
    Record(RecordValue),
}

impl Scalar {
    /// Scalar dtype, or `None` for records.
    #[must_use]
    pub fn dtype(&self) -> Option<DType> {
        self.descr().as_dtype()
    }

    #[must_use]
    pub fn descr(&self) -> Descr {
        Descr::Scalar(match self {
            Self::Bool(_) => DType::Bool,
            Self::I8(_) => DType::I8,
            Self::I16(_) => DType::I16,
            Self::I32(_) => DType::I32,
            Self::I64(_) => DType::I64,
            Self::U8(_) => DType::U8,
            Self::U16(_) => DType::U16,
            Self::U32(_) => DType::U32,
            Self::U64(_) => DType::U64,
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
            Self::Complex64(_) => DType::Complex64,
            Self::Complex128(_) => DType::Complex128,
            Self::DateTime64(_, unit) => DType::DateTime64(*unit),
            Self::TimeDelta64(_, unit) => DType::TimeDelta64(*unit),
            Self::Bytes(bytes) => DType::Bytes(bytes.len()),
            Self::Record(value) => return Descr::Record(Arc::clone(value.descr())),
        })
    }

    /// The zero / false / empty value of `dtype`.
    #[must_use]
    pub fn zero(dtype: DType) -> Self {
        match dtype {
            DType::Bytes(len) => Self::Bytes(vec![0; len]),
            DType::DateTime64(unit) => Self::DateTime64(0, unit),
            DType::TimeDelta64(unit) => Self::TimeDelta64(0, unit),
            other => Self::from_i128(other, 0),
        }
    }

    /// The value a freshly allocated element of `descr` holds.
    #[must_use]
    pub fn default_for(descr: &Descr) -> Self {
        match descr {
            Descr::Scalar(dtype) => Self::zero(*dtype),
            Descr::Record(record) => Self::Record(RecordValue::zeroed(Arc::clone(record))),
        }
    }

    /// Writes the little-endian image of this value into `out`, which must
    /// be exactly `descr().item_size()` bytes long.
    pub fn encode(&self, out: &mut [u8]) {
        match self {
            Self::Bool(v) => out[0] = u8::from(*v),
            Self::I8(v) => out.copy_from_slice(&v.to_le_bytes()),
            Self::I16(v) => out.copy_from_slice(&v.to_le_bytes()),
            Self::I32(v) => out.copy_from_slice(&v.to_le_bytes()),
            Self::I64(v) | Self::DateTime64(v, _) | Self::TimeDelta64(v, _) => {
                out.copy_from_slice(&v.to_le_bytes());
            }
            Self::U8(v) => out[0] = *v,
            Self::U16(v) => out.copy_from_slice(&v.to_le_bytes()),
            Self::U32(v) => out.copy_from_slice(&v.to_le_bytes()),
            Self::U64(v) => out.copy_from_slice(&v.to_le_bytes()),
            Self::F32(v) => out.copy_from_slice(&v.to_le_bytes()),
            Self::F64(v) => out.copy_from_slice(&v.to_le_bytes()),
            Self::Complex64(c) => {
                out[..4].copy_from_slice(&c.re.to_le_bytes());
                out[4..].copy_from_slice(&c.im.to_le_bytes());
            }
            Self::Complex128(c) => {
                out[..8].copy_from_slice(&c.re.to_le_bytes());
                out[8..].copy_from_slice(&c.im.to_le_bytes());
            }
            Self::Bytes(bytes) => out.copy_from_slice(bytes),
            Self::Record(value) => out.copy_from_slice(value.bytes()),
        }
    }

    /// Reads one element of `descr` from its little-endian image.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is shorter than `descr.item_size()`.
    #[must_use]
    pub fn decode(descr: &Descr, raw: &[u8]) -> Self {
        debug_assert_eq!(raw.len(), descr.item_size(), "element image of {descr}");
        match descr {
            Descr::Scalar(dtype) => Self::decode_dtype(*dtype, raw),
            Descr::Record(record) => Self::Record(RecordValue::from_image(Arc::clone(record), raw)),
        }
    }

    fn decode_dtype(dtype: DType, raw: &[u8]) -> Self {
        fn arr<const N: usize>(raw: &[u8]) -> [u8; N] {
            let mut buf = [0u8; N];
            buf.copy_from_slice(&raw[..N]);
            buf
        }
        match dtype {
            DType::Bool => Self::Bool(raw[0] != 0),
            DType::I8 => Self::I8(i8::from_le_bytes(arr(raw))),
            DType::I16 => Self::I16(i16::from_le_bytes(arr(raw))),
            DType::I32 => Self::I32(i32::from_le_bytes(arr(raw))),
            DType::I64 => Self::I64(i64::from_le_bytes(arr(raw))),
            DType::U8 => Self::U8(raw[0]),
            DType::U16 => Self::U16(u16::from_le_bytes(arr(raw))),
            DType::U32 => Self::U32(u32::from_le_bytes(arr(raw))),
            DType::U64 => Self::U64(u64::from_le_bytes(arr(raw))),
            DType::F32 => Self::F32(f32::from_le_bytes(arr(raw))),
            DType::F64 => Self::F64(f64::from_le_bytes(arr(raw))),
            DType::Complex64 => Self::Complex64(Complex::new(
                f32::from_le_bytes(arr(raw)),
                f32::from_le_bytes(arr(&raw[4..])),
            )),
            DType::Complex128 => Self::Complex128(Complex::new(
                f64::from_le_bytes(arr(raw)),
                f64::from_le_bytes(arr(&raw[8..])),
            )),
            DType::DateTime64(unit) => Self::DateTime64(i64::from_le_bytes(arr(raw)), unit),
            DType::TimeDelta64(unit) => Self::TimeDelta64(i64::from_le_bytes(arr(raw)), unit),
            DType::Bytes(len) => Self::Bytes(raw[..len].to_vec()),
        }
    }

    /// Real value of bool, integer and float scalars; the real part of
    /// complex ones.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        Some(match self {
            Self::Bool(v) => f64::from(u8::from(*v)),
            Self::I8(v) => f64::from(*v),
            Self::I16(v) => f64::from(*v),
            Self::I32(v) => f64::from(*v),
            Self::I64(v) => *v as f64,
            Self::U8(v) => f64::from(*v),
            Self::U16(v) => f64::from(*v),
            Self::U32(v) => f64::from(*v),
            Self::U64(v) => *v as f64,
            Self::F32(v) => f64::from(*v),
            Self::F64(v) => *v,
            Self::Complex64(c) => f64::from(c.re),
            Self::Complex128(c) => c.re,
            _ => return None,
        })
    }

    #[must_use]
    pub fn as_complex(&self) -> Option<Complex<f64>> {
        match self {
            Self::Complex64(c) => Some(Complex::new(f64::from(c.re), f64::from(c.im))),
            Self::Complex128(c) => Some(*c),
            other => other.as_f64().map(|re| Complex::new(re, 0.0)),
        }
    }

    /// Exact value of bool and integer scalars, and the tick count of
    /// temporal ones.
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        Some(match self {
            Self::Bool(v) => i128::from(*v),
            Self::I8(v) => i128::from(*v),
            Self::I16(v) => i128::from(*v),
            Self::I32(v) => i128::from(*v),
            Self::I64(v) | Self::DateTime64(v, _) | Self::TimeDelta64(v, _) => i128::from(*v),
            Self::U8(v) => i128::from(*v),
            Self::U16(v) => i128::from(*v),
            Self::U32(v) => i128::from(*v),
            Self::U64(v) => i128::from(*v),
            _ => return None,
        })
    }

    /// NumPy truthiness: nonzero numbers (NaN included) and non-empty
    /// byte strings are true.
    #[must_use]
    pub fn is_truthy(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::F32(_) | Self::F64(_) => self.as_f64().map(|v| v != 0.0),
            Self::Complex64(_) | Self::Complex128(_) => {
                self.as_complex().map(|c| c.re != 0.0 || c.im != 0.0)
            }
            Self::Bytes(bytes) => Some(bytes.iter().any(|&b| b != 0)),
            Self::Record(_) => None,
            other => other.as_i128().map(|v| v != 0),
        }
    }

    /// Converts a real value into `dtype` with C-style unsafe-cast
    /// semantics: floats truncate toward zero, integers wrap.
    #[must_use]
    pub fn from_f64(dtype: DType, v: f64) -> Self {
        match dtype {
            DType::Bool => Self::Bool(v != 0.0),
            DType::F32 => Self::F32(v as f32),
            DType::F64 => Self::F64(v),
            DType::Complex64 => Self::Complex64(Complex::new(v as f32, 0.0)),
            DType::Complex128 => Self::Complex128(Complex::new(v, 0.0)),
            DType::U64 if v >= 0.0 => Self::U64(v as u64),
            DType::Bytes(len) => Self::Bytes(fit_bytes(v.to_string().into_bytes(), len)),
            other => Self::from_i128(other, i128::from(v as i64)),
        }
    }

    /// Converts an exact integer into `dtype`, wrapping on overflow.
    #[must_use]
    pub fn from_i128(dtype: DType, v: i128) -> Self {
        match dtype {
            DType::Bool => Self::Bool(v != 0),
            DType::I8 => Self::I8(v as i8),
            DType::I16 => Self::I16(v as i16),
            DType::I32 => Self::I32(v as i32),
            DType::I64 => Self::I64(v as i64),
            DType::U8 => Self::U8(v as u8),
            DType::U16 => Self::U16(v as u16),
            DType::U32 => Self::U32(v as u32),
            DType::U64 => Self::U64(v as u64),
            DType::F32 => Self::F32(v as f32),
            DType::F64 => Self::F64(v as f64),
            DType::Complex64 => Self::Complex64(Complex::new(v as f32, 0.0)),
            DType::Complex128 => Self::Complex128(Complex::new(v as f64, 0.0)),
            DType::DateTime64(unit) => Self::DateTime64(v as i64, unit),
            DType::TimeDelta64(unit) => Self::TimeDelta64(v as i64, unit),
            DType::Bytes(len) => Self::Bytes(fit_bytes(v.to_string().into_bytes(), len)),
        }
    }

    /// Converts a complex value into `dtype`; real targets drop the
    /// imaginary part.
    #[must_use]
    pub fn from_complex(dtype: DType, c: Complex<f64>) -> Self {
        match dtype {
            DType::Complex64 => Self::Complex64(Complex::new(c.re as f32, c.im as f32)),
            DType::Complex128 => Self::Complex128(c),
            other => Self::from_f64(other, c.re),
        }
    }

    /// Casts to `dtype` with unsafe-casting semantics. Fails only when no
    /// conversion exists at all (records, bytes to numbers, datetimes to
    /// floats, calendar to linear time units).
    pub fn cast(&self, dtype: DType) -> Result<Self, TypeError> {
        if self.dtype() == Some(dtype) {
            return Ok(self.clone());
        }
        let invalid = || TypeError::InvalidCast {
            from: self.descr().to_string(),
            to: dtype.to_string(),
        };

        match (self, dtype) {
            (Self::Record(_), _) => Err(invalid()),
            (Self::Bytes(bytes), DType::Bytes(len)) => Ok(Self::Bytes(fit_bytes(bytes.clone(), len))),
            (Self::Bytes(_), _) => Err(invalid()),
            (Self::DateTime64(v, from), DType::DateTime64(to)) => convert_ticks(*v, *from, to)
                .map(|v| Self::DateTime64(v, to))
                .ok_or_else(invalid),
            (Self::TimeDelta64(v, from), DType::TimeDelta64(to)) => convert_ticks(*v, *from, to)
                .map(|v| Self::TimeDelta64(v, to))
                .ok_or_else(invalid),
            (Self::DateTime64(v, _) | Self::TimeDelta64(v, _), target)
                if target.is_integer() || target == DType::Bool || matches!(target, DType::Bytes(_)) =>
            {
                Ok(Self::from_i128(target, i128::from(*v)))
            }
            (Self::DateTime64(..) | Self::TimeDelta64(..), _) => Err(invalid()),
            (_, DType::TimeDelta64(unit)) => match self.as_i128() {
                Some(v) => Ok(Self::TimeDelta64(v as i64, unit)),
                None => Err(invalid()),
            },
            (_, DType::DateTime64(_)) => Err(invalid()),
            (_, target) if target.is_complex() => self
                .as_complex()
                .map(|c| Self::from_complex(target, c))
                .ok_or_else(invalid),
            (_, DType::Bool) => self.is_truthy().map(Self::Bool).ok_or_else(invalid),
            (_, target) => match self.as_i128() {
                Some(v) => Ok(Self::from_i128(target, v)),
                None => self
                    .as_f64()
                    .map(|v| Self::from_f64(target, v))
                    .ok_or_else(invalid),
            },
        }
    }
}

fn fit_bytes(mut bytes: Vec<u8>, len: usize) -> Vec<u8> {
    bytes.resize(len, 0);
    bytes
}

/// Rescales a tick count between time units. Calendar units convert only
/// among themselves.
fn convert_ticks(value: i64, from: TimeUnit, to: TimeUnit) -> Option<i64> {
    if from == to || from == TimeUnit::Generic || to == TimeUnit::Generic {
        return Some(value);
    }
    match (from, to) {
        (TimeUnit::Year, TimeUnit::Month) => value.checked_mul(12),
        (TimeUnit::Month, TimeUnit::Year) => Some(value.div_euclid(12)),
        _ => {
            let from_as = from.attoseconds()?;
            let to_as = to.attoseconds()?;
            let scaled = if from_as >= to_as {
                i128::from(value).checked_mul(from_as / to_as)?
            } else {
                i128::from(value).div_euclid(to_as / from_as)
            };
            i64::try_from(scaled).ok()
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => f.write_str(if *v { "True" } else { "False" }),
            Self::I8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Complex64(c) => write!(f, "({}{:+}j)", c.re, c.im),
            Self::Complex128(c) => write!(f, "({}{:+}j)", c.re, c.im),
            Self::DateTime64(v, unit) => write!(f, "datetime64({v}, '{}')", unit.code()),
            Self::TimeDelta64(v, unit) => write!(f, "timedelta64({v}, '{}')", unit.code()),
            Self::Bytes(bytes) => write!(f, "b{:?}", String::from_utf8_lossy(bytes)),
            Self::Record(value) => {
                f.write_str("(")?;
                for (idx, field) in value.descr().fields().iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    match value.get_field(&field.name) {
                        Ok(crate::FieldValue::Scalar(s)) => write!(f, "{s}")?,
                        Ok(crate::FieldValue::SubArray { values, .. }) => {
                            let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                            write!(f, "[{}]", parts.join(", "))?;
                        }
                        Err(_) => f.write_str("?")?,
                    }
                }
                f.write_str(")")
            }
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

scalar_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Complex<f32> => Complex64,
    Complex<f64> => Complex128,
    RecordValue => Record,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Scalar;
    use crate::{Complex, DType, Descr, RecordDescr, RecordValue, TimeUnit};
    use nrt_runtime::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn defaults_are_zero_for_every_scalar_dtype() {
        for dtype in DType::NUMERIC {
            let value = Scalar::default_for(&Descr::Scalar(dtype));
            assert_eq!(value.dtype(), Some(dtype));
            assert_eq!(value.is_truthy(), Some(false), "{dtype}");
        }
        assert_eq!(Scalar::zero(DType::Bytes(3)), Scalar::Bytes(vec![0, 0, 0]));
    }

    #[test]
    fn record_default_is_zero_filled() {
        let record = Arc::new(RecordDescr::scalars([("a", DType::I16), ("b", DType::F64)]).expect("record"));
        let Scalar::Record(value) = Scalar::default_for(&Descr::Record(Arc::clone(&record))) else {
            panic!("record default");
        };
        assert_eq!(value.bytes(), &[0u8; 10]);
        assert_eq!(
            Scalar::Record(value).descr(),
            Descr::Record(record)
        );
    }

    #[test]
    fn record_images_decode_field_by_field() {
        let record = Arc::new(RecordDescr::scalars([("a", DType::I16), ("b", DType::F64)]).expect("record"));
        let mut value = RecordValue::zeroed(Arc::clone(&record));
        value.set_field("a", Scalar::I16(-3)).expect("set a");
        value.set_field("b", Scalar::F64(0.5)).expect("set b");
        let image = value.bytes().to_vec();
        let decoded = Scalar::decode(&Descr::Record(record), &image);
        assert_eq!(decoded, Scalar::Record(value));
    }

    #[test]
    #[should_panic]
    fn short_record_images_are_not_zero_filled() {
        let record = Arc::new(RecordDescr::scalars([("a", DType::I16), ("b", DType::F64)]).expect("record"));
        let _ = Scalar::decode(&Descr::Record(record), &[1, 2, 3]);
    }

    #[test]
    fn encoding_is_little_endian() {
        let mut buf = [0u8; 4];
        Scalar::I32(0x0102_0304).encode(&mut buf);
        assert_eq!(buf, [4, 3, 2, 1]);

        let mut buf = [0u8; 8];
        Scalar::Complex64(Complex::new(1.0, -2.0)).encode(&mut buf);
        assert_eq!(
            Scalar::decode(&Descr::Scalar(DType::Complex64), &buf),
            Scalar::Complex64(Complex::new(1.0, -2.0))
        );
    }

    #[test]
    fn unsafe_casts_truncate_and_wrap() {
        assert_eq!(Scalar::F64(-2.7).cast(DType::I32), Ok(Scalar::I32(-2)));
        assert_eq!(Scalar::I32(300).cast(DType::U8), Ok(Scalar::U8(44)));
        assert_eq!(Scalar::I8(-1).cast(DType::U16), Ok(Scalar::U16(u16::MAX)));
        assert_eq!(Scalar::F64(f64::NAN).cast(DType::Bool), Ok(Scalar::Bool(true)));
        assert_eq!(
            Scalar::Complex128(Complex::new(3.5, 9.0)).cast(DType::F32),
            Ok(Scalar::F32(3.5))
        );
        assert_eq!(
            Scalar::U64(u64::MAX).cast(DType::F64),
            Ok(Scalar::F64(u64::MAX as f64))
        );
    }

    #[test]
    fn temporal_casts_rescale_units() {
        let secs = Scalar::TimeDelta64(3, TimeUnit::Second);
        assert_eq!(
            secs.cast(DType::TimeDelta64(TimeUnit::Millisecond)),
            Ok(Scalar::TimeDelta64(3_000, TimeUnit::Millisecond))
        );
        assert_eq!(
            Scalar::DateTime64(-1, TimeUnit::Hour).cast(DType::DateTime64(TimeUnit::Day)),
            Ok(Scalar::DateTime64(-1, TimeUnit::Day))
        );
        let err = Scalar::DateTime64(1, TimeUnit::Month)
            .cast(DType::DateTime64(TimeUnit::Day))
            .expect_err("calendar to linear");
        assert_eq!(err.kind(), ErrorKind::DType);
        assert!(Scalar::DateTime64(1, TimeUnit::Day).cast(DType::F64).is_err());
        assert_eq!(
            Scalar::I32(5).cast(DType::TimeDelta64(TimeUnit::Second)),
            Ok(Scalar::TimeDelta64(5, TimeUnit::Second))
        );
    }

    #[test]
    fn bytes_pad_and_truncate() {
        let raw = Scalar::Bytes(b"abc".to_vec());
        assert_eq!(raw.cast(DType::Bytes(5)), Ok(Scalar::Bytes(b"abc\0\0".to_vec())));
        assert_eq!(raw.cast(DType::Bytes(2)), Ok(Scalar::Bytes(b"ab".to_vec())));
        assert!(raw.cast(DType::I32).is_err());
    }

    proptest! {
        #[test]
        fn encode_decode_preserves_numeric_values(v in any::<i64>(), f in any::<f64>()) {
            for dtype in DType::NUMERIC {
                let value = Scalar::from_i128(dtype, i128::from(v));
                let mut buf = vec![0u8; dtype.item_size()];
                value.encode(&mut buf);
                prop_assert_eq!(Scalar::decode(&Descr::Scalar(dtype), &buf), value);
            }
            let value = Scalar::F64(f);
            let mut buf = [0u8; 8];
            value.encode(&mut buf);
            let back = Scalar::decode(&Descr::Scalar(DType::F64), &buf);
            prop_assert_eq!(back.as_f64().map(f64::to_bits), Some(f.to_bits()));
        }

        #[test]
        fn integer_casts_agree_with_as_semantics(v in any::<i64>()) {
            prop_assert_eq!(Scalar::I64(v).cast(DType::I8), Ok(Scalar::I8(v as i8)));
            prop_assert_eq!(Scalar::I64(v).cast(DType::U32), Ok(Scalar::U32(v as u32)));
            prop_assert_eq!(Scalar::I64(v).cast(DType::F64), Ok(Scalar::F64(v as f64)));
        }
    }
}
