#![forbid(unsafe_code)]

mod record;
mod resolve;
mod scalar;

pub use num_complex::Complex;
pub use record::{FieldDescr, FieldId, FieldValue, RecordDescr, RecordValue};
pub use resolve::{ArrayType, Descr, FieldSpec, Layout, ResolvedType, TypeSpec, parse_dtype_name, resolve};
pub use scalar::Scalar;

use nrt_runtime::ErrorKind;

/// Time unit carried by `datetime64` / `timedelta64` dtypes, ordered from
/// coarsest to finest. `Generic` is the unit-less placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeUnit {
    Generic,
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
    Picosecond,
    Femtosecond,
    Attosecond,
}

impl TimeUnit {
    pub const ALL: [Self; 14] = [
        Self::Generic,
        Self::Year,
        Self::Month,
        Self::Week,
        Self::Day,
        Self::Hour,
        Self::Minute,
        Self::Second,
        Self::Millisecond,
        Self::Microsecond,
        Self::Nanosecond,
        Self::Picosecond,
        Self::Femtosecond,
        Self::Attosecond,
    ];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Year => "Y",
            Self::Month => "M",
            Self::Week => "W",
            Self::Day => "D",
            Self::Hour => "h",
            Self::Minute => "m",
            Self::Second => "s",
            Self::Millisecond => "ms",
            Self::Microsecond => "us",
            Self::Nanosecond => "ns",
            Self::Picosecond => "ps",
            Self::Femtosecond => "fs",
            Self::Attosecond => "as",
        }
    }

    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|unit| unit.code() == code)
            .or(match code {
                "" => Some(Self::Generic),
                "μs" => Some(Self::Microsecond),
                _ => None,
            })
    }

    /// Length of one tick in attoseconds. Calendar units (years, months)
    /// and the generic unit have no fixed length.
    #[must_use]
    pub const fn attoseconds(self) -> Option<i128> {
        const SECOND: i128 = 1_000_000_000_000_000_000;
        match self {
            Self::Generic | Self::Year | Self::Month => None,
            Self::Week => Some(7 * 86_400 * SECOND),
            Self::Day => Some(86_400 * SECOND),
            Self::Hour => Some(3_600 * SECOND),
            Self::Minute => Some(60 * SECOND),
            Self::Second => Some(SECOND),
            Self::Millisecond => Some(SECOND / 1_000),
            Self::Microsecond => Some(SECOND / 1_000_000),
            Self::Nanosecond => Some(SECOND / 1_000_000_000),
            Self::Picosecond => Some(1_000_000),
            Self::Femtosecond => Some(1_000),
            Self::Attosecond => Some(1),
        }
    }

    /// The finer of two units; the generic unit yields to any concrete one.
    #[must_use]
    pub fn finer(self, other: Self) -> Self {
        self.max(other)
    }
}

/// Canonical scalar dtypes. Structured element types are described by
/// [`Descr::Record`], which refers to these for its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Complex64,
    Complex128,
    DateTime64(TimeUnit),
    TimeDelta64(TimeUnit),
    /// Fixed-length byte sequence; opaque to every ufunc.
    Bytes(usize),
}

impl DType {
    pub const NUMERIC: [Self; 13] = [
        Self::Bool,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::F32,
        Self::F64,
        Self::Complex64,
        Self::Complex128,
    ];

    #[must_use]
    pub const fn item_size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64
            | Self::U64
            | Self::F64
            | Self::Complex64
            | Self::DateTime64(_)
            | Self::TimeDelta64(_) => 8,
            Self::Complex128 => 16,
            Self::Bytes(len) => len,
        }
    }

    /// NumPy kind character.
    #[must_use]
    pub const fn kind(self) -> char {
        match self {
            Self::Bool => 'b',
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => 'i',
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => 'u',
            Self::F32 | Self::F64 => 'f',
            Self::Complex64 | Self::Complex128 => 'c',
            Self::DateTime64(_) => 'M',
            Self::TimeDelta64(_) => 'm',
            Self::Bytes(_) => 'S',
        }
    }

    /// Returns `true` if this is a signed or unsigned integer type (not Bool).
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self.kind(), 'i' | 'u')
    }

    #[must_use]
    pub const fn is_signed_integer(self) -> bool {
        self.kind() == 'i'
    }

    #[must_use]
    pub const fn is_unsigned_integer(self) -> bool {
        self.kind() == 'u'
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    #[must_use]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// Integer, float or complex. Bool is not numeric on its own.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(self, Self::DateTime64(_) | Self::TimeDelta64(_))
    }

    #[must_use]
    const fn is_bool_or_numeric(self) -> bool {
        matches!(self, Self::Bool) || self.is_numeric()
    }

    /// Bit width of integer and bool types.
    #[must_use]
    pub const fn int_bits(self) -> Option<u32> {
        match self {
            Self::Bool => Some(1),
            Self::I8 | Self::U8 => Some(8),
            Self::I16 | Self::U16 => Some(16),
            Self::I32 | Self::U32 => Some(32),
            Self::I64 | Self::U64 => Some(64),
            _ => None,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::I8 => f.write_str("int8"),
            Self::I16 => f.write_str("int16"),
            Self::I32 => f.write_str("int32"),
            Self::I64 => f.write_str("int64"),
            Self::U8 => f.write_str("uint8"),
            Self::U16 => f.write_str("uint16"),
            Self::U32 => f.write_str("uint32"),
            Self::U64 => f.write_str("uint64"),
            Self::F32 => f.write_str("float32"),
            Self::F64 => f.write_str("float64"),
            Self::Complex64 => f.write_str("complex64"),
            Self::Complex128 => f.write_str("complex128"),
            Self::DateTime64(TimeUnit::Generic) => f.write_str("datetime64"),
            Self::TimeDelta64(TimeUnit::Generic) => f.write_str("timedelta64"),
            Self::DateTime64(unit) => write!(f, "datetime64[{}]", unit.code()),
            Self::TimeDelta64(unit) => write!(f, "timedelta64[{}]", unit.code()),
            Self::Bytes(len) => write!(f, "bytes{len}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("unsupported type '{spec}': {reason}")]
    Unsupported { spec: String, reason: &'static str },
    #[error("no field named '{name}' in {record}")]
    FieldNotFound { name: String, record: String },
    #[error("field '{field}' expects {expected}, got {actual}")]
    FieldTypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },
    #[error("expected a {expected} value, got {actual}")]
    ValueMismatch { expected: String, actual: String },
    #[error("no common dtype for {lhs} and {rhs}")]
    NoCommonType { lhs: DType, rhs: DType },
    #[error("cannot cast {from} to {to}")]
    InvalidCast { from: String, to: String },
}

impl TypeError {
    pub(crate) fn unsupported(spec: impl Into<String>, reason: &'static str) -> Self {
        Self::Unsupported {
            spec: spec.into(),
            reason,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported { .. } => ErrorKind::UnsupportedType,
            Self::FieldNotFound { .. } => ErrorKind::FieldNotFound,
            Self::FieldTypeMismatch { .. } | Self::ValueMismatch { .. } => ErrorKind::TypeMismatch,
            Self::NoCommonType { .. } | Self::InvalidCast { .. } => ErrorKind::DType,
        }
    }

    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        self.kind().reason_code()
    }
}

/// Promotion for bool and numeric dtypes, following NumPy's
/// `promote_types`. Returns `None` when either side is not numeric.
///
/// `Bool` is the identity. Integers of one signedness keep the wider
/// width; mixed signedness needs a signed type wider than the unsigned
/// side, and `uint64` with any signed type has none, so it becomes
/// `float64`. Anything involving a float or complex type is decided by
/// component width alone.
#[must_use]
pub const fn promote_numeric(lhs: DType, rhs: DType) -> Option<DType> {
    if !lhs.is_bool_or_numeric() || !rhs.is_bool_or_numeric() {
        return None;
    }
    if matches!(lhs, DType::Bool) {
        return Some(rhs);
    }
    if matches!(rhs, DType::Bool) {
        return Some(lhs);
    }

    if let (Some(lbits), Some(rbits)) = (lhs.int_bits(), rhs.int_bits()) {
        let (lsigned, rsigned) = (lhs.is_signed_integer(), rhs.is_signed_integer());
        let bits = if lbits > rbits { lbits } else { rbits };
        if lsigned == rsigned {
            return Some(integer_with_bits(lsigned, bits));
        }
        let (signed_bits, unsigned_bits) = if lsigned { (lbits, rbits) } else { (rbits, lbits) };
        return Some(if signed_bits > unsigned_bits {
            integer_with_bits(true, signed_bits)
        } else if unsigned_bits < 64 {
            integer_with_bits(true, unsigned_bits * 2)
        } else {
            DType::F64
        });
    }

    let lwidth = component_bits(lhs);
    let rwidth = component_bits(rhs);
    let wide = lwidth > 32 || rwidth > 32;
    Some(match (lhs.is_complex() || rhs.is_complex(), wide) {
        (true, true) => DType::Complex128,
        (true, false) => DType::Complex64,
        (false, true) => DType::F64,
        (false, false) => DType::F32,
    })
}

const fn integer_with_bits(signed: bool, bits: u32) -> DType {
    match (signed, bits) {
        (true, 8) => DType::I8,
        (true, 16) => DType::I16,
        (true, 32) => DType::I32,
        (true, _) => DType::I64,
        (false, 8) => DType::U8,
        (false, 16) => DType::U16,
        (false, 32) => DType::U32,
        (false, _) => DType::U64,
    }
}

/// Width of the float component needed to hold `dt`. Integers up to 16
/// bits fit `float32`; wider ones need `float64`.
const fn component_bits(dt: DType) -> u32 {
    match dt {
        DType::F32 | DType::Complex64 => 32,
        DType::F64 | DType::Complex128 => 64,
        _ => match dt.int_bits() {
            Some(bits) if bits <= 16 => 32,
            _ => 64,
        },
    }
}

/// Promotion among datetime, timedelta and byte-string dtypes.
#[must_use]
pub fn promote_non_numeric(lhs: DType, rhs: DType) -> Option<DType> {
    use DType::*;

    match (lhs, rhs) {
        (DateTime64(a), DateTime64(b))
        | (DateTime64(a), TimeDelta64(b))
        | (TimeDelta64(a), DateTime64(b)) => Some(DateTime64(a.finer(b))),
        (TimeDelta64(a), TimeDelta64(b)) => Some(TimeDelta64(a.finer(b))),
        (TimeDelta64(unit), other) | (other, TimeDelta64(unit))
            if other == Bool || other.is_integer() =>
        {
            Some(TimeDelta64(unit))
        }
        (Bytes(a), Bytes(b)) => Some(Bytes(a.max(b))),
        _ => None,
    }
}

/// The smallest dtype both operands can be represented in, or `DTypeError`
/// when the combination has no common representation.
pub fn promote(lhs: DType, rhs: DType) -> Result<DType, TypeError> {
    promote_numeric(lhs, rhs)
        .or_else(|| promote_non_numeric(lhs, rhs))
        .ok_or(TypeError::NoCommonType { lhs, rhs })
}

/// Folds [`promote`] across a list of dtypes (`np.result_type`).
pub fn result_type(dtypes: &[DType]) -> Result<DType, TypeError> {
    let Some((&first, rest)) = dtypes.split_first() else {
        return Ok(DType::Bool);
    };
    rest.iter().try_fold(first, |acc, &dt| promote(acc, dt))
}

/// Accumulator dtype for `sum`/`prod` reductions: small integers and
/// booleans widen to 64 bits so the accumulation cannot overflow early.
#[must_use]
pub const fn promote_for_sum_reduction(dt: DType) -> DType {
    match dt {
        DType::Bool | DType::I8 | DType::I16 | DType::I32 | DType::I64 => DType::I64,
        DType::U8 | DType::U16 | DType::U32 | DType::U64 => DType::U64,
        other => other,
    }
}

/// Result dtype of `mean`/`var`/`std`: integers and booleans become float64.
#[must_use]
pub const fn promote_for_mean_reduction(dt: DType) -> DType {
    match dt {
        DType::Bool
        | DType::I8
        | DType::I16
        | DType::I32
        | DType::I64
        | DType::U8
        | DType::U16
        | DType::U32
        | DType::U64 => DType::F64,
        other => other,
    }
}

/// Returns `true` if `src` can be cast to `dst` without information loss.
/// Follows NumPy's safe-cast rules.
#[must_use]
pub fn can_cast_lossless(src: DType, dst: DType) -> bool {
    use DType::*;

    match (src, dst) {
        (DateTime64(a), DateTime64(b)) | (TimeDelta64(a), TimeDelta64(b)) => {
            a == b || a == TimeUnit::Generic || (b >= a && linear_units(a, b))
        }
        (Bytes(a), Bytes(b)) => b >= a,
        _ => matches!(
            (src, dst),
            (Bool, Bool | I8 | I16 | I32 | I64 | U8 | U16 | U32 | U64 | F32 | F64 | Complex64 | Complex128)
                | (I8, I8 | I16 | I32 | I64 | F32 | F64 | Complex64 | Complex128)
                | (I16, I16 | I32 | I64 | F32 | F64 | Complex64 | Complex128)
                | (I32, I32 | I64 | F64 | Complex128)
                | (I64, I64 | F64 | Complex128)
                | (U8, U8 | U16 | U32 | U64 | I16 | I32 | I64 | F32 | F64 | Complex64 | Complex128)
                | (U16, U16 | U32 | U64 | I32 | I64 | F32 | F64 | Complex64 | Complex128)
                | (U32, U32 | U64 | I64 | F64 | Complex128)
                | (U64, U64 | F64 | Complex128)
                | (F32, F32 | F64 | Complex64 | Complex128)
                | (F64, F64 | Complex128)
                | (Complex64, Complex64 | Complex128)
                | (Complex128, Complex128)
        ),
    }
}

/// NumPy `same_kind` casting: safe casts plus casts within a kind or
/// towards a higher kind (bool < int < float < complex).
#[must_use]
pub fn can_cast_same_kind(from: DType, to: DType) -> bool {
    if can_cast_lossless(from, to) {
        return true;
    }
    let rank = |dt: DType| match dt.kind() {
        'b' => Some(0),
        'i' | 'u' => Some(1),
        'f' => Some(2),
        'c' => Some(3),
        _ => None,
    };
    match (from, to) {
        (DType::DateTime64(_), DType::DateTime64(_))
        | (DType::TimeDelta64(_), DType::TimeDelta64(_))
        | (DType::Bytes(_), DType::Bytes(_)) => true,
        _ => matches!((rank(from), rank(to)), (Some(a), Some(b)) if a <= b),
    }
}

fn linear_units(a: TimeUnit, b: TimeUnit) -> bool {
    a.attoseconds().is_some() && b.attoseconds().is_some()
}

#[cfg(test)]
mod tests {
    use super::{
        DType, TimeUnit, TypeError, can_cast_lossless, can_cast_same_kind, promote,
        promote_for_mean_reduction, promote_for_sum_reduction, promote_numeric, result_type,
    };
    use nrt_runtime::ErrorKind;

    #[test]
    fn promotion_is_commutative() {
        for &lhs in &DType::NUMERIC {
            for &rhs in &DType::NUMERIC {
                assert_eq!(promote(lhs, rhs), promote(rhs, lhs), "{lhs:?}/{rhs:?}");
            }
        }
    }

    #[test]
    fn promotion_is_transitive_over_scoped_matrix() {
        let dtypes = DType::NUMERIC;

        for &src in &dtypes {
            for &mid in &dtypes {
                for &dst in &dtypes {
                    if promote(src, mid) == Ok(mid) && promote(mid, dst) == Ok(dst) {
                        assert_eq!(
                            promote(src, dst),
                            Ok(dst),
                            "non-transitive promotion path: {src:?} -> {mid:?} -> {dst:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn promotion_expectations_hold() {
        assert_eq!(promote(DType::Bool, DType::I32), Ok(DType::I32));
        assert_eq!(promote(DType::I32, DType::I64), Ok(DType::I64));
        assert_eq!(promote(DType::I32, DType::F32), Ok(DType::F64));
        assert_eq!(promote(DType::I16, DType::F32), Ok(DType::F32));
        assert_eq!(promote(DType::F32, DType::F64), Ok(DType::F64));
        assert_eq!(promote(DType::F64, DType::Complex64), Ok(DType::Complex128));
    }

    #[test]
    fn promotion_signed_unsigned_cross() {
        assert_eq!(promote(DType::U8, DType::I8), Ok(DType::I16));
        assert_eq!(promote(DType::U16, DType::I16), Ok(DType::I32));
        assert_eq!(promote(DType::U32, DType::I32), Ok(DType::I64));
        assert_eq!(promote(DType::U64, DType::I64), Ok(DType::F64));
    }

    #[test]
    fn promotion_is_symmetric_and_tracks_component_width() {
        for &lhs in &DType::NUMERIC {
            for &rhs in &DType::NUMERIC {
                assert_eq!(promote_numeric(lhs, rhs), promote_numeric(rhs, lhs), "{lhs} / {rhs}");
            }
        }
        assert_eq!(promote_numeric(DType::Bool, DType::Bool), Some(DType::Bool));
        assert_eq!(promote_numeric(DType::I8, DType::U32), Some(DType::I64));
        assert_eq!(promote_numeric(DType::I16, DType::U8), Some(DType::I16));
        assert_eq!(promote_numeric(DType::U8, DType::F32), Some(DType::F32));
        assert_eq!(promote_numeric(DType::U32, DType::F32), Some(DType::F64));
        assert_eq!(promote_numeric(DType::U16, DType::Complex64), Some(DType::Complex64));
        assert_eq!(promote_numeric(DType::I32, DType::Complex64), Some(DType::Complex128));
        assert_eq!(promote_numeric(DType::F32, DType::Complex64), Some(DType::Complex64));
        assert_eq!(promote_numeric(DType::U64, DType::F32), Some(DType::F64));
    }

    #[test]
    fn promoted_type_holds_both_operands_losslessly() {
        for &lhs in &DType::NUMERIC {
            for &rhs in &DType::NUMERIC {
                let out = promote(lhs, rhs).expect("numeric pair promotes");
                // u64 with a signed type is the one documented lossy rung
                let lossy_rung = matches!((lhs, rhs), (DType::U64, r) | (r, DType::U64)
                    if r.is_signed_integer());
                if !lossy_rung {
                    assert!(can_cast_lossless(lhs, out), "{lhs} -> {out}");
                    assert!(can_cast_lossless(rhs, out), "{rhs} -> {out}");
                }
            }
        }
    }

    #[test]
    fn temporal_promotion_picks_finer_unit() {
        let day = DType::DateTime64(TimeUnit::Day);
        let ns = DType::TimeDelta64(TimeUnit::Nanosecond);
        assert_eq!(promote(day, ns), Ok(DType::DateTime64(TimeUnit::Nanosecond)));
        assert_eq!(
            promote(DType::TimeDelta64(TimeUnit::Second), DType::I32),
            Ok(DType::TimeDelta64(TimeUnit::Second))
        );
        assert_eq!(
            promote(
                DType::DateTime64(TimeUnit::Generic),
                DType::DateTime64(TimeUnit::Second)
            ),
            Ok(DType::DateTime64(TimeUnit::Second))
        );
    }

    #[test]
    fn unrepresentable_combinations_fail_with_dtype_error() {
        let err = promote(DType::DateTime64(TimeUnit::Second), DType::F64)
            .expect_err("datetime + float has no common type");
        assert!(matches!(err, TypeError::NoCommonType { .. }));
        assert_eq!(err.kind(), ErrorKind::DType);

        assert!(promote(DType::Bytes(4), DType::I8).is_err());
        assert!(promote_numeric(DType::Bytes(4), DType::Bool).is_none());
        assert_eq!(promote(DType::Bytes(4), DType::Bytes(9)), Ok(DType::Bytes(9)));
    }

    #[test]
    fn result_type_folds_promotion() {
        assert_eq!(
            result_type(&[DType::I8, DType::U8, DType::F32]),
            Ok(DType::F32)
        );
        assert_eq!(result_type(&[]), Ok(DType::Bool));
        assert!(result_type(&[DType::F64, DType::Bytes(2)]).is_err());
    }

    #[test]
    fn cast_rules() {
        assert!(can_cast_lossless(DType::Bool, DType::F64));
        assert!(!can_cast_lossless(DType::I64, DType::I32));
        assert!(!can_cast_lossless(DType::U8, DType::I8));
        assert!(can_cast_lossless(
            DType::TimeDelta64(TimeUnit::Second),
            DType::TimeDelta64(TimeUnit::Nanosecond)
        ));
        assert!(!can_cast_lossless(
            DType::TimeDelta64(TimeUnit::Month),
            DType::TimeDelta64(TimeUnit::Day)
        ));
        assert!(can_cast_same_kind(DType::I64, DType::I8));
        assert!(can_cast_same_kind(DType::I64, DType::F32));
        assert!(!can_cast_same_kind(DType::F64, DType::I64));
        assert!(!can_cast_same_kind(DType::Complex64, DType::F64));
    }

    #[test]
    fn reduction_promotions_match_numpy() {
        assert_eq!(promote_for_sum_reduction(DType::Bool), DType::I64);
        assert_eq!(promote_for_sum_reduction(DType::U16), DType::U64);
        assert_eq!(promote_for_sum_reduction(DType::F32), DType::F32);
        assert_eq!(promote_for_mean_reduction(DType::I8), DType::F64);
        assert_eq!(promote_for_mean_reduction(DType::Complex64), DType::Complex64);
    }

    #[test]
    fn item_sizes_and_names() {
        assert_eq!(DType::Complex128.item_size(), 16);
        assert_eq!(DType::Bytes(7).item_size(), 7);
        assert_eq!(DType::DateTime64(TimeUnit::Nanosecond).item_size(), 8);
        assert_eq!(
            DType::DateTime64(TimeUnit::Nanosecond).to_string(),
            "datetime64[ns]"
        );
        assert_eq!(DType::TimeDelta64(TimeUnit::Generic).to_string(), "timedelta64");
        assert_eq!(DType::U16.to_string(), "uint16");
    }

    #[test]
    fn time_unit_codes_roundtrip() {
        for unit in TimeUnit::ALL {
            assert_eq!(TimeUnit::parse(unit.code()), Some(unit));
        }
        assert_eq!(TimeUnit::parse("fortnight"), None);
        assert_eq!(TimeUnit::Day.finer(TimeUnit::Second), TimeUnit::Second);
    }
}
