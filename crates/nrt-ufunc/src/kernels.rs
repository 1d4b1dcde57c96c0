use std::cmp::Ordering;
use std::f64::consts::{LN_2, LN_10};

use nrt_dtype::{Complex, DType, Scalar, promote};

/// Tick value that marks a missing datetime / timedelta.
const NAT: i128 = i64::MIN as i128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negative,
    Absolute,
    Sign,
    Sqrt,
    Square,
    Reciprocal,
    Exp,
    Exp2,
    Expm1,
    Log,
    Log2,
    Log10,
    Log1p,
    Sin,
    Cos,
    Tan,
    Arcsin,
    Arccos,
    Arctan,
    Sinh,
    Cosh,
    Tanh,
    Cbrt,
    Floor,
    Ceil,
    Trunc,
    Rint,
    Deg2rad,
    Rad2deg,
    Conjugate,
    IsNan,
    IsInf,
    IsFinite,
    LogicalNot,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Remainder,
    Fmod,
    Power,
    Maximum,
    Minimum,
    Fmax,
    Fmin,
    Arctan2,
    Hypot,
    Copysign,
    Logaddexp,
    Ldexp,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LeftShift,
    RightShift,
}

/// One input, two outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryPairOp {
    /// (fractional part, integral part)
    Modf,
    /// (mantissa in [0.5, 1), exponent)
    Frexp,
}

/// Two inputs, two outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryPairOp {
    /// (floor quotient, remainder)
    Divmod,
}

/// Dtypes a kernel loop runs at: each input is cast to `inputs[i]` before
/// evaluation, and each result is produced as `outputs[j]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSignature {
    pub inputs: Vec<DType>,
    pub outputs: Vec<DType>,
}

impl LoopSignature {
    fn unary(input: DType, output: DType) -> Self {
        Self {
            inputs: vec![input],
            outputs: vec![output],
        }
    }

    fn binary(lhs: DType, rhs: DType, output: DType) -> Self {
        Self {
            inputs: vec![lhs, rhs],
            outputs: vec![output],
        }
    }
}

impl std::fmt::Display for LoopSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |dts: &[DType]| dts.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
        write!(f, "({})->({})", join(&self.inputs), join(&self.outputs))
    }
}

/// Element-level failure; the dispatcher attaches the ufunc name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DomainError(pub(crate) &'static str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Bool,
    Int,
    Float,
    Complex,
    DateTime,
    TimeDelta,
    Other,
}

fn class(dtype: DType) -> Class {
    match dtype {
        DType::Bool => Class::Bool,
        dt if dt.is_integer() => Class::Int,
        dt if dt.is_float() => Class::Float,
        dt if dt.is_complex() => Class::Complex,
        DType::DateTime64(_) => Class::DateTime,
        DType::TimeDelta64(_) => Class::TimeDelta,
        _ => Class::Other,
    }
}

/// Loop dtype of float-only kernels: bool and integers compute in float64.
fn float_for(dtype: DType) -> DType {
    match class(dtype) {
        Class::Float | Class::Complex => dtype,
        _ => DType::F64,
    }
}

fn real_of(dtype: DType) -> DType {
    match dtype {
        DType::Complex64 => DType::F32,
        DType::Complex128 => DType::F64,
        other => other,
    }
}

impl UnaryOp {
    pub(crate) fn signature(self, x: DType) -> Option<LoopSignature> {
        use Class::{Bool, Complex, Float, Int, Other, TimeDelta};

        let c = class(x);
        let same = |dt: DType| Some(LoopSignature::unary(dt, dt));
        match self {
            Self::Negative => matches!(c, Int | Float | Complex | TimeDelta).then(|| LoopSignature::unary(x, x)),
            Self::Absolute => match c {
                Bool | Int | Float | TimeDelta => same(x),
                Complex => Some(LoopSignature::unary(x, real_of(x))),
                _ => None,
            },
            Self::Sign => matches!(c, Int | Float | Complex).then(|| LoopSignature::unary(x, x)),
            Self::Square | Self::Reciprocal => match c {
                Bool => same(DType::I8),
                Int | Float | Complex => same(x),
                _ => None,
            },
            Self::Conjugate => matches!(c, Bool | Int | Float | Complex).then(|| LoopSignature::unary(x, x)),
            Self::Sqrt
            | Self::Exp
            | Self::Exp2
            | Self::Expm1
            | Self::Log
            | Self::Log2
            | Self::Log10
            | Self::Log1p
            | Self::Sin
            | Self::Cos
            | Self::Tan
            | Self::Arcsin
            | Self::Arccos
            | Self::Arctan
            | Self::Sinh
            | Self::Cosh
            | Self::Tanh
            | Self::Rint => match c {
                Bool | Int | Float | Complex => same(float_for(x)),
                _ => None,
            },
            Self::Cbrt | Self::Floor | Self::Ceil | Self::Trunc | Self::Deg2rad | Self::Rad2deg => {
                match c {
                    Bool | Int | Float => same(float_for(x)),
                    _ => None,
                }
            }
            Self::IsNan | Self::IsInf | Self::IsFinite => {
                (c != Other).then(|| LoopSignature::unary(x, DType::Bool))
            }
            Self::LogicalNot => matches!(c, Bool | Int | Float | Complex)
                .then(|| LoopSignature::unary(DType::Bool, DType::Bool)),
            Self::Invert => matches!(c, Bool | Int).then(|| LoopSignature::unary(x, x)),
        }
    }

    pub(crate) fn eval(self, sig: &LoopSignature, x: &Scalar) -> Result<Scalar, DomainError> {
        let (ct, out) = (sig.inputs[0], sig.outputs[0]);
        match self {
            Self::IsNan | Self::IsInf | Self::IsFinite => {
                return Ok(Scalar::Bool(predicate(self, ct, x)));
            }
            Self::LogicalNot => return Ok(Scalar::Bool(!truthy(x))),
            _ => {}
        }

        match class(ct) {
            Class::Bool => {
                let v = truthy(x);
                match self {
                    Self::Invert => Ok(Scalar::Bool(!v)),
                    Self::Absolute | Self::Conjugate => Ok(Scalar::Bool(v)),
                    _ => Err(DomainError("no boolean kernel")),
                }
            }
            Class::Int => int_unary(self, int(x)).map(|v| Scalar::from_i128(out, v)),
            Class::Float => float_unary(self, real(x)).map(|v| Scalar::from_f64(out, v)),
            Class::Complex => {
                let z = complex(x);
                if self == Self::Absolute {
                    return Ok(Scalar::from_f64(out, z.norm()));
                }
                complex_unary(self, z).map(|z| Scalar::from_complex(out, z))
            }
            Class::TimeDelta => {
                let v = int(x);
                let r = match self {
                    _ if v == NAT => NAT,
                    Self::Negative => -v,
                    Self::Absolute => v.abs(),
                    _ => return Err(DomainError("no timedelta kernel")),
                };
                Ok(Scalar::from_i128(out, r))
            }
            Class::DateTime | Class::Other => Err(DomainError("no kernel for this dtype")),
        }
    }
}

impl BinaryOp {
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
        )
    }

    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, Self::LogicalAnd | Self::LogicalOr | Self::LogicalXor)
    }

    pub(crate) fn signature(self, a: DType, b: DType) -> Option<LoopSignature> {
        use Class::{Bool, Complex, DateTime, Float, Int, Other, TimeDelta};

        let (ca, cb) = (class(a), class(b));
        if ca == Other || cb == Other {
            return None;
        }
        if self == Self::Ldexp {
            if !matches!(ca, Bool | Int | Float) || !matches!(cb, Bool | Int) {
                return None;
            }
            let f = float_for(a);
            return Some(LoopSignature::binary(f, DType::I64, f));
        }
        if self.is_logical() {
            return Some(LoopSignature::binary(DType::Bool, DType::Bool, DType::Bool));
        }
        if matches!(ca, DateTime | TimeDelta) || matches!(cb, DateTime | TimeDelta) {
            return self.temporal_signature(a, b);
        }

        let common = promote(a, b).ok()?;
        let cc = class(common);
        let sig = |input: DType, output: DType| Some(LoopSignature::binary(input, input, output));
        match self {
            Self::Add | Self::Multiply | Self::Maximum | Self::Minimum | Self::Fmax | Self::Fmin => {
                sig(common, common)
            }
            Self::Subtract => (cc != Bool).then(|| LoopSignature::binary(common, common, common)),
            Self::FloorDivide | Self::Remainder | Self::Fmod => match cc {
                Bool => sig(DType::I8, DType::I8),
                Int | Float => sig(common, common),
                _ => None,
            },
            Self::Power => match cc {
                Bool => sig(DType::I8, DType::I8),
                _ => sig(common, common),
            },
            Self::Divide => {
                let f = float_for(common);
                sig(f, f)
            }
            Self::Arctan2 | Self::Hypot | Self::Copysign | Self::Logaddexp => {
                (cc != Complex).then(|| {
                    let f = float_for(common);
                    LoopSignature::binary(f, f, f)
                })
            }
            Self::Equal
            | Self::NotEqual
            | Self::Less
            | Self::LessEqual
            | Self::Greater
            | Self::GreaterEqual => sig(common, DType::Bool),
            Self::BitwiseAnd | Self::BitwiseOr | Self::BitwiseXor => {
                matches!(cc, Bool | Int).then(|| LoopSignature::binary(common, common, common))
            }
            Self::LeftShift | Self::RightShift => match cc {
                Bool => sig(DType::I8, DType::I8),
                Int => sig(common, common),
                _ => None,
            },
            Self::Ldexp | Self::LogicalAnd | Self::LogicalOr | Self::LogicalXor => None,
        }
    }

    /// Datetime arithmetic: datetime ± timedelta, datetime − datetime,
    /// timedelta arithmetic with integers, and same-kind comparisons.
    fn temporal_signature(self, a: DType, b: DType) -> Option<LoopSignature> {
        use Class::{Bool, DateTime, Int, TimeDelta};

        let common = promote(a, b).ok()?;
        let unit = match common {
            DType::DateTime64(unit) | DType::TimeDelta64(unit) => unit,
            _ => return None,
        };
        let target = |dt: DType| match class(dt) {
            DateTime => DType::DateTime64(unit),
            _ => DType::TimeDelta64(unit),
        };
        let (ca, cb) = (class(a), class(b));
        let sig = |out: DType| Some(LoopSignature::binary(target(a), target(b), out));
        let same_kind = ca == cb;

        match self {
            Self::Add => match (ca, cb) {
                (DateTime, DateTime) => None,
                (DateTime, TimeDelta | Int | Bool) | (TimeDelta | Int | Bool, DateTime) => {
                    sig(DType::DateTime64(unit))
                }
                _ => sig(DType::TimeDelta64(unit)),
            },
            Self::Subtract => match (ca, cb) {
                (DateTime, DateTime) => sig(DType::TimeDelta64(unit)),
                (DateTime, TimeDelta | Int | Bool) => sig(DType::DateTime64(unit)),
                (TimeDelta, TimeDelta | Int | Bool) | (Int | Bool, TimeDelta) => {
                    sig(DType::TimeDelta64(unit))
                }
                _ => None,
            },
            Self::Multiply => match (ca, cb) {
                (TimeDelta, Int | Bool) | (Int | Bool, TimeDelta) => sig(DType::TimeDelta64(unit)),
                _ => None,
            },
            Self::Maximum | Self::Minimum | Self::Fmax | Self::Fmin if same_kind => sig(common),
            op if op.is_comparison() && same_kind => sig(DType::Bool),
            _ => None,
        }
    }

    pub(crate) fn eval(self, sig: &LoopSignature, a: &Scalar, b: &Scalar) -> Result<Scalar, DomainError> {
        let (ct, out) = (sig.inputs[0], sig.outputs[0]);
        if self.is_logical() {
            let (x, y) = (truthy(a), truthy(b));
            return Ok(Scalar::Bool(match self {
                Self::LogicalAnd => x && y,
                Self::LogicalOr => x || y,
                _ => x ^ y,
            }));
        }
        if self.is_comparison() {
            return Ok(Scalar::Bool(compare(self, class(ct), a, b)));
        }

        match class(ct) {
            Class::Bool => {
                let (x, y) = (truthy(a), truthy(b));
                let r = match self {
                    Self::Add | Self::Maximum | Self::Fmax | Self::BitwiseOr => x || y,
                    Self::Multiply | Self::Minimum | Self::Fmin | Self::BitwiseAnd => x && y,
                    Self::BitwiseXor => x ^ y,
                    _ => return Err(DomainError("no boolean kernel")),
                };
                Ok(Scalar::Bool(r))
            }
            Class::Int => {
                let bits = ct.int_bits().unwrap_or(64);
                int_binary(self, bits, int(a), int(b)).map(|v| Scalar::from_i128(out, v))
            }
            Class::Float if self == Self::Ldexp => Ok(Scalar::from_f64(out, ldexp(real(a), int(b)))),
            Class::Float => float_binary(self, real(a), real(b)).map(|v| Scalar::from_f64(out, v)),
            Class::Complex => {
                complex_binary(self, complex(a), complex(b)).map(|z| Scalar::from_complex(out, z))
            }
            Class::DateTime | Class::TimeDelta => {
                temporal_binary(self, int(a), int(b)).map(|v| Scalar::from_i128(out, v))
            }
            Class::Other => Err(DomainError("no kernel for this dtype")),
        }
    }
}

impl UnaryPairOp {
    pub(crate) fn signature(self, x: DType) -> Option<LoopSignature> {
        if !matches!(class(x), Class::Bool | Class::Int | Class::Float) {
            return None;
        }
        let f = float_for(x);
        let second = match self {
            Self::Modf => f,
            Self::Frexp => DType::I32,
        };
        Some(LoopSignature {
            inputs: vec![f],
            outputs: vec![f, second],
        })
    }

    pub(crate) fn eval(self, sig: &LoopSignature, x: &Scalar) -> (Scalar, Scalar) {
        let v = real(x);
        let out = sig.outputs[0];
        match self {
            Self::Modf => {
                let (frac, whole) = if v.is_infinite() {
                    (0.0f64.copysign(v), v)
                } else {
                    (v.fract(), v.trunc())
                };
                (Scalar::from_f64(out, frac), Scalar::from_f64(out, whole))
            }
            Self::Frexp => {
                let (mantissa, exp) = frexp(v);
                (Scalar::from_f64(out, mantissa), Scalar::I32(exp))
            }
        }
    }
}

impl BinaryPairOp {
    pub(crate) fn signature(self, a: DType, b: DType) -> Option<LoopSignature> {
        let mut sig = BinaryOp::FloorDivide.signature(a, b)?;
        let out = sig.outputs[0];
        sig.outputs.push(out);
        Some(sig)
    }

    pub(crate) fn eval(
        self,
        sig: &LoopSignature,
        a: &Scalar,
        b: &Scalar,
    ) -> Result<(Scalar, Scalar), DomainError> {
        match self {
            Self::Divmod => Ok((
                BinaryOp::FloorDivide.eval(sig, a, b)?,
                BinaryOp::Remainder.eval(sig, a, b)?,
            )),
        }
    }
}

fn truthy(x: &Scalar) -> bool {
    x.is_truthy().unwrap_or(false)
}

fn int(x: &Scalar) -> i128 {
    x.as_i128().unwrap_or_default()
}

fn real(x: &Scalar) -> f64 {
    x.as_f64().unwrap_or(f64::NAN)
}

fn complex(x: &Scalar) -> Complex<f64> {
    x.as_complex().unwrap_or(Complex::new(f64::NAN, 0.0))
}

fn predicate(op: UnaryOp, ct: DType, x: &Scalar) -> bool {
    let (nan, inf) = match class(ct) {
        Class::Float => {
            let v = real(x);
            (v.is_nan(), v.is_infinite())
        }
        Class::Complex => {
            let z = complex(x);
            (z.re.is_nan() || z.im.is_nan(), z.re.is_infinite() || z.im.is_infinite())
        }
        Class::DateTime | Class::TimeDelta => (int(x) == NAT, false),
        _ => (false, false),
    };
    match op {
        UnaryOp::IsNan => nan,
        UnaryOp::IsInf => inf,
        _ => !nan && !inf,
    }
}

fn complex_ordering(a: Complex<f64>, b: Complex<f64>) -> Option<Ordering> {
    if a.re.is_nan() || a.im.is_nan() || b.re.is_nan() || b.im.is_nan() {
        return None;
    }
    match a.re.partial_cmp(&b.re) {
        Some(Ordering::Equal) => a.im.partial_cmp(&b.im),
        other => other,
    }
}

fn compare(op: BinaryOp, c: Class, a: &Scalar, b: &Scalar) -> bool {
    let ordering = match c {
        Class::Float => real(a).partial_cmp(&real(b)),
        Class::Complex => complex_ordering(complex(a), complex(b)),
        Class::DateTime | Class::TimeDelta if int(a) == NAT || int(b) == NAT => None,
        _ => Some(int(a).cmp(&int(b))),
    };
    match op {
        BinaryOp::Equal => ordering == Some(Ordering::Equal),
        BinaryOp::NotEqual => ordering != Some(Ordering::Equal),
        BinaryOp::Less => ordering == Some(Ordering::Less),
        BinaryOp::LessEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        BinaryOp::Greater => ordering == Some(Ordering::Greater),
        BinaryOp::GreaterEqual => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        _ => false,
    }
}

fn int_pow(mut base: i128, mut exp: i128) -> i128 {
    let mut acc = 1i128;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    acc
}

/// Integer kernels. Operands are exact values of the loop dtype; results
/// wrap when truncated back to it.
fn int_binary(op: BinaryOp, bits: u32, a: i128, b: i128) -> Result<i128, DomainError> {
    Ok(match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Subtract => a.wrapping_sub(b),
        BinaryOp::Multiply => a.wrapping_mul(b),
        BinaryOp::FloorDivide if b == 0 => 0,
        BinaryOp::FloorDivide => {
            let q = a / b;
            if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q }
        }
        BinaryOp::Remainder if b == 0 => 0,
        BinaryOp::Remainder => {
            let r = a % b;
            if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
        }
        BinaryOp::Fmod if b == 0 => 0,
        BinaryOp::Fmod => a % b,
        BinaryOp::Power if b < 0 => {
            return Err(DomainError("integers to negative integer powers are not allowed"));
        }
        BinaryOp::Power => int_pow(a, b),
        BinaryOp::Maximum | BinaryOp::Fmax => a.max(b),
        BinaryOp::Minimum | BinaryOp::Fmin => a.min(b),
        BinaryOp::BitwiseAnd => a & b,
        BinaryOp::BitwiseOr => a | b,
        BinaryOp::BitwiseXor => a ^ b,
        BinaryOp::LeftShift if b < 0 || b >= i128::from(bits) => 0,
        BinaryOp::LeftShift => a << b,
        BinaryOp::RightShift if b < 0 || b >= i128::from(bits) => {
            if a < 0 { -1 } else { 0 }
        }
        BinaryOp::RightShift => a >> b,
        _ => return Err(DomainError("no integer kernel")),
    })
}

fn py_remainder(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return f64::NAN;
    }
    let m = a % b;
    if m == 0.0 {
        0.0f64.copysign(b)
    } else if (b < 0.0) != (m < 0.0) {
        m + b
    } else {
        m
    }
}

fn py_floor_divide(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return a / b;
    }
    let m = a % b;
    let mut div = (a - m) / b;
    if m != 0.0 && ((b < 0.0) != (m < 0.0)) {
        div -= 1.0;
    }
    if div == 0.0 {
        return 0.0f64.copysign(a / b);
    }
    let floor = div.floor();
    if div - floor > 0.5 { floor + 1.0 } else { floor }
}

fn logaddexp(a: f64, b: f64) -> f64 {
    if a == b {
        return a + LN_2;
    }
    let diff = a - b;
    if diff > 0.0 {
        a + (-diff).exp().ln_1p()
    } else if diff <= 0.0 {
        b + diff.exp().ln_1p()
    } else {
        diff
    }
}

fn ldexp(x: f64, exp: i128) -> f64 {
    let mut e = exp.clamp(-2200, 2200) as i32;
    let mut v = x;
    while e != 0 {
        let step = e.clamp(-1000, 1000);
        v *= 2f64.powi(step);
        e -= step;
    }
    v
}

fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    if biased == 0 {
        let (m, e) = frexp(x * 2f64.powi(54));
        return (m, e - 54);
    }
    let mantissa = f64::from_bits((bits & !(0x7ff << 52)) | (1022 << 52));
    (mantissa, biased - 1022)
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Result<f64, DomainError> {
    Ok(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::FloorDivide => py_floor_divide(a, b),
        BinaryOp::Remainder => py_remainder(a, b),
        BinaryOp::Fmod => {
            if b == 0.0 {
                f64::NAN
            } else {
                a % b
            }
        }
        BinaryOp::Power => a.powf(b),
        BinaryOp::Maximum => {
            if a.is_nan() || b.is_nan() {
                f64::NAN
            } else {
                a.max(b)
            }
        }
        BinaryOp::Minimum => {
            if a.is_nan() || b.is_nan() {
                f64::NAN
            } else {
                a.min(b)
            }
        }
        // fmax/fmin return the non-NaN operand
        BinaryOp::Fmax => a.max(b),
        BinaryOp::Fmin => a.min(b),
        BinaryOp::Arctan2 => a.atan2(b),
        BinaryOp::Hypot => a.hypot(b),
        BinaryOp::Copysign => a.copysign(b),
        BinaryOp::Logaddexp => logaddexp(a, b),
        _ => return Err(DomainError("no floating-point kernel")),
    })
}

fn complex_nan(z: Complex<f64>) -> bool {
    z.re.is_nan() || z.im.is_nan()
}

fn complex_binary(op: BinaryOp, a: Complex<f64>, b: Complex<f64>) -> Result<Complex<f64>, DomainError> {
    let pick = |take_a: bool| if take_a { a } else { b };
    Ok(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::Power if b == Complex::new(0.0, 0.0) => Complex::new(1.0, 0.0),
        BinaryOp::Power => a.powc(b),
        BinaryOp::Maximum | BinaryOp::Minimum if complex_nan(a) => a,
        BinaryOp::Maximum | BinaryOp::Minimum if complex_nan(b) => b,
        BinaryOp::Fmax | BinaryOp::Fmin if complex_nan(b) => a,
        BinaryOp::Fmax | BinaryOp::Fmin if complex_nan(a) => b,
        BinaryOp::Maximum | BinaryOp::Fmax => {
            pick(complex_ordering(a, b) != Some(Ordering::Less))
        }
        BinaryOp::Minimum | BinaryOp::Fmin => {
            pick(complex_ordering(a, b) != Some(Ordering::Greater))
        }
        _ => return Err(DomainError("no complex kernel")),
    })
}

fn temporal_binary(op: BinaryOp, a: i128, b: i128) -> Result<i128, DomainError> {
    if matches!(op, BinaryOp::Fmax | BinaryOp::Fmin) {
        if a == NAT {
            return Ok(b);
        }
        if b == NAT {
            return Ok(a);
        }
    }
    if a == NAT || b == NAT {
        return Ok(NAT);
    }
    Ok(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a.wrapping_mul(b),
        BinaryOp::Maximum | BinaryOp::Fmax => a.max(b),
        BinaryOp::Minimum | BinaryOp::Fmin => a.min(b),
        _ => return Err(DomainError("no datetime kernel")),
    })
}

fn int_unary(op: UnaryOp, v: i128) -> Result<i128, DomainError> {
    Ok(match op {
        UnaryOp::Negative => v.wrapping_neg(),
        UnaryOp::Absolute => v.wrapping_abs(),
        UnaryOp::Sign => v.signum(),
        UnaryOp::Square => v.wrapping_mul(v),
        UnaryOp::Reciprocal if v == 0 => 0,
        UnaryOp::Reciprocal => 1 / v,
        UnaryOp::Conjugate => v,
        UnaryOp::Invert => !v,
        _ => return Err(DomainError("no integer kernel")),
    })
}

fn float_unary(op: UnaryOp, x: f64) -> Result<f64, DomainError> {
    Ok(match op {
        UnaryOp::Negative => -x,
        UnaryOp::Absolute => x.abs(),
        UnaryOp::Sign => {
            if x.is_nan() {
                f64::NAN
            } else if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
        UnaryOp::Sqrt if x < 0.0 => {
            return Err(DomainError("square root of a negative real number"));
        }
        UnaryOp::Sqrt => x.sqrt(),
        UnaryOp::Square => x * x,
        UnaryOp::Reciprocal => 1.0 / x,
        UnaryOp::Exp => x.exp(),
        UnaryOp::Exp2 => x.exp2(),
        UnaryOp::Expm1 => x.exp_m1(),
        UnaryOp::Log => x.ln(),
        UnaryOp::Log2 => x.log2(),
        UnaryOp::Log10 => x.log10(),
        UnaryOp::Log1p => x.ln_1p(),
        UnaryOp::Sin => x.sin(),
        UnaryOp::Cos => x.cos(),
        UnaryOp::Tan => x.tan(),
        UnaryOp::Arcsin => x.asin(),
        UnaryOp::Arccos => x.acos(),
        UnaryOp::Arctan => x.atan(),
        UnaryOp::Sinh => x.sinh(),
        UnaryOp::Cosh => x.cosh(),
        UnaryOp::Tanh => x.tanh(),
        UnaryOp::Cbrt => x.cbrt(),
        UnaryOp::Floor => x.floor(),
        UnaryOp::Ceil => x.ceil(),
        UnaryOp::Trunc => x.trunc(),
        // half to even
        UnaryOp::Rint => x.round_ties_even(),
        UnaryOp::Deg2rad => x.to_radians(),
        UnaryOp::Rad2deg => x.to_degrees(),
        UnaryOp::Conjugate => x,
        _ => return Err(DomainError("no floating-point kernel")),
    })
}

fn complex_unary(op: UnaryOp, z: Complex<f64>) -> Result<Complex<f64>, DomainError> {
    let one = Complex::new(1.0, 0.0);
    Ok(match op {
        UnaryOp::Negative => -z,
        UnaryOp::Sign => {
            let norm = z.norm();
            if norm == 0.0 { Complex::new(0.0, 0.0) } else { z.unscale(norm) }
        }
        UnaryOp::Sqrt => z.sqrt(),
        UnaryOp::Square => z * z,
        UnaryOp::Reciprocal => one / z,
        UnaryOp::Exp => z.exp(),
        UnaryOp::Exp2 => z.scale(LN_2).exp(),
        UnaryOp::Expm1 => z.exp() - one,
        UnaryOp::Log => z.ln(),
        UnaryOp::Log2 => z.ln().unscale(LN_2),
        UnaryOp::Log10 => z.ln().unscale(LN_10),
        UnaryOp::Log1p => (z + one).ln(),
        UnaryOp::Sin => z.sin(),
        UnaryOp::Cos => z.cos(),
        UnaryOp::Tan => z.tan(),
        UnaryOp::Arcsin => z.asin(),
        UnaryOp::Arccos => z.acos(),
        UnaryOp::Arctan => z.atan(),
        UnaryOp::Sinh => z.sinh(),
        UnaryOp::Cosh => z.cosh(),
        UnaryOp::Tanh => z.tanh(),
        UnaryOp::Rint => Complex::new(z.re.round_ties_even(), z.im.round_ties_even()),
        UnaryOp::Conjugate => z.conj(),
        _ => return Err(DomainError("no complex kernel")),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        BinaryOp, BinaryPairOp, DomainError, LoopSignature, UnaryOp, UnaryPairOp, frexp,
        py_floor_divide, py_remainder,
    };
    use nrt_dtype::{Complex, DType, Scalar, TimeUnit};

    fn binary(op: BinaryOp, a: Scalar, b: Scalar) -> Result<Scalar, DomainError> {
        let sig = op
            .signature(a.dtype().expect("dtype"), b.dtype().expect("dtype"))
            .expect("loop exists");
        let a = a.cast(sig.inputs[0]).expect("cast lhs");
        let b = b.cast(sig.inputs[1]).expect("cast rhs");
        op.eval(&sig, &a, &b)
    }

    fn unary(op: UnaryOp, x: Scalar) -> Result<Scalar, DomainError> {
        let sig = op.signature(x.dtype().expect("dtype")).expect("loop exists");
        let x = x.cast(sig.inputs[0]).expect("cast");
        op.eval(&sig, &x)
    }

    #[test]
    fn signatures_follow_kernel_families() {
        assert_eq!(
            BinaryOp::Add.signature(DType::I32, DType::F32),
            Some(LoopSignature::binary(DType::F64, DType::F64, DType::F64))
        );
        assert_eq!(
            BinaryOp::Divide.signature(DType::I64, DType::I64),
            Some(LoopSignature::binary(DType::F64, DType::F64, DType::F64))
        );
        assert_eq!(
            BinaryOp::Less.signature(DType::U8, DType::I8).map(|s| s.outputs),
            Some(vec![DType::Bool])
        );
        assert_eq!(BinaryOp::BitwiseAnd.signature(DType::F64, DType::I64), None);
        assert_eq!(BinaryOp::Subtract.signature(DType::Bool, DType::Bool), None);
        assert_eq!(UnaryOp::Sqrt.signature(DType::I16).map(|s| s.outputs), Some(vec![DType::F64]));
        assert_eq!(
            UnaryOp::Absolute.signature(DType::Complex64).map(|s| s.outputs),
            Some(vec![DType::F32])
        );
        assert_eq!(UnaryOp::Floor.signature(DType::Complex128), None);
        assert_eq!(BinaryOp::Add.signature(DType::Bytes(3), DType::Bytes(3)), None);
    }

    #[test]
    fn integer_kernels_wrap_and_zero_on_division_by_zero() {
        assert_eq!(binary(BinaryOp::Add, Scalar::I8(127), Scalar::I8(1)), Ok(Scalar::I8(-128)));
        assert_eq!(binary(BinaryOp::Multiply, Scalar::U8(16), Scalar::U8(16)), Ok(Scalar::U8(0)));
        assert_eq!(binary(BinaryOp::FloorDivide, Scalar::I32(7), Scalar::I32(0)), Ok(Scalar::I32(0)));
        assert_eq!(binary(BinaryOp::FloorDivide, Scalar::I32(-7), Scalar::I32(2)), Ok(Scalar::I32(-4)));
        assert_eq!(binary(BinaryOp::Remainder, Scalar::I32(-7), Scalar::I32(2)), Ok(Scalar::I32(1)));
        assert_eq!(binary(BinaryOp::Fmod, Scalar::I32(-7), Scalar::I32(2)), Ok(Scalar::I32(-1)));
        assert_eq!(binary(BinaryOp::Power, Scalar::I64(3), Scalar::I64(4)), Ok(Scalar::I64(81)));
        assert!(binary(BinaryOp::Power, Scalar::I64(3), Scalar::I64(-1)).is_err());
        assert_eq!(
            binary(BinaryOp::FloorDivide, Scalar::I64(i64::MIN), Scalar::I64(-1)),
            Ok(Scalar::I64(i64::MIN))
        );
        assert_eq!(binary(BinaryOp::LeftShift, Scalar::U8(1), Scalar::U8(9)), Ok(Scalar::U8(0)));
        assert_eq!(binary(BinaryOp::RightShift, Scalar::I8(-8), Scalar::I8(100)), Ok(Scalar::I8(-1)));
        assert_eq!(unary(UnaryOp::Absolute, Scalar::I8(i8::MIN)), Ok(Scalar::I8(i8::MIN)));
        assert_eq!(unary(UnaryOp::Invert, Scalar::U8(0)), Ok(Scalar::U8(255)));
    }

    #[test]
    fn float_kernels_follow_ieee_and_python_division() {
        assert_eq!(py_remainder(-7.0, 2.0), 1.0);
        assert_eq!(py_remainder(7.0, -2.0), -1.0);
        assert_eq!(py_floor_divide(-7.0, 2.0), -4.0);
        assert_eq!(py_floor_divide(1.0, 0.0), f64::INFINITY);
        assert_eq!(binary(BinaryOp::Divide, Scalar::I32(1), Scalar::I32(2)), Ok(Scalar::F64(0.5)));
        let Ok(Scalar::F64(v)) = binary(BinaryOp::Maximum, Scalar::F64(f64::NAN), Scalar::F64(1.0)) else {
            panic!("maximum");
        };
        assert!(v.is_nan());
        assert_eq!(binary(BinaryOp::Fmax, Scalar::F64(f64::NAN), Scalar::F64(1.0)), Ok(Scalar::F64(1.0)));
        assert_eq!(unary(UnaryOp::Rint, Scalar::F64(2.5)), Ok(Scalar::F64(2.0)));
        assert_eq!(unary(UnaryOp::Rint, Scalar::F64(3.5)), Ok(Scalar::F64(4.0)));
        let Ok(Scalar::F64(l)) = binary(BinaryOp::Logaddexp, Scalar::F64(0.0), Scalar::F64(0.0)) else {
            panic!("logaddexp");
        };
        assert!((l - std::f64::consts::LN_2).abs() < 1e-15);
    }

    #[test]
    fn sqrt_of_negative_real_is_a_domain_error() {
        assert!(unary(UnaryOp::Sqrt, Scalar::F64(-1.0)).is_err());
        assert_eq!(unary(UnaryOp::Sqrt, Scalar::I32(9)), Ok(Scalar::F64(3.0)));
        let Ok(Scalar::Complex128(z)) = unary(UnaryOp::Sqrt, Scalar::Complex128(Complex::new(-1.0, 0.0))) else {
            panic!("complex sqrt");
        };
        assert!((z - Complex::new(0.0, 1.0)).norm() < 1e-15);
    }

    #[test]
    fn comparisons_handle_nan_and_complex_order() {
        assert_eq!(binary(BinaryOp::Equal, Scalar::F64(f64::NAN), Scalar::F64(f64::NAN)), Ok(Scalar::Bool(false)));
        assert_eq!(binary(BinaryOp::NotEqual, Scalar::F64(f64::NAN), Scalar::F64(1.0)), Ok(Scalar::Bool(true)));
        assert_eq!(
            binary(
                BinaryOp::Less,
                Scalar::Complex128(Complex::new(1.0, 5.0)),
                Scalar::Complex128(Complex::new(2.0, 0.0))
            ),
            Ok(Scalar::Bool(true))
        );
        assert_eq!(binary(BinaryOp::Greater, Scalar::U64(u64::MAX), Scalar::I64(-1)), Ok(Scalar::Bool(true)));
    }

    #[test]
    fn datetime_arithmetic_aligns_units() {
        let day = Scalar::DateTime64(1, TimeUnit::Day);
        let hours = Scalar::TimeDelta64(6, TimeUnit::Hour);
        assert_eq!(
            binary(BinaryOp::Add, day.clone(), hours),
            Ok(Scalar::DateTime64(30, TimeUnit::Hour))
        );
        assert_eq!(
            binary(BinaryOp::Subtract, day.clone(), Scalar::DateTime64(0, TimeUnit::Day)),
            Ok(Scalar::TimeDelta64(1, TimeUnit::Day))
        );
        assert_eq!(BinaryOp::Add.signature(DType::DateTime64(TimeUnit::Day), DType::DateTime64(TimeUnit::Day)), None);
        assert_eq!(BinaryOp::Multiply.signature(DType::DateTime64(TimeUnit::Day), DType::I64), None);
        let nat = Scalar::TimeDelta64(i64::MIN, TimeUnit::Second);
        assert_eq!(unary(UnaryOp::IsNan, nat.clone()), Ok(Scalar::Bool(true)));
        assert_eq!(
            binary(BinaryOp::Equal, nat.clone(), nat),
            Ok(Scalar::Bool(false))
        );
    }

    #[test]
    fn boolean_loops_use_logical_semantics() {
        assert_eq!(binary(BinaryOp::Add, Scalar::Bool(true), Scalar::Bool(true)), Ok(Scalar::Bool(true)));
        assert_eq!(binary(BinaryOp::LogicalXor, Scalar::I32(2), Scalar::F64(0.0)), Ok(Scalar::Bool(true)));
        assert_eq!(unary(UnaryOp::LogicalNot, Scalar::F64(0.0)), Ok(Scalar::Bool(true)));
        assert_eq!(binary(BinaryOp::Power, Scalar::Bool(true), Scalar::Bool(false)), Ok(Scalar::I8(1)));
    }

    #[test]
    fn two_output_kernels() {
        assert_eq!(frexp(8.0), (0.5, 4));
        assert_eq!(frexp(-3.0), (-0.75, 2));
        assert_eq!(frexp(f64::MIN_POSITIVE / 4.0), (0.5, -1023));
        let sig = UnaryPairOp::Modf.signature(DType::F64).expect("modf loop");
        assert_eq!(
            UnaryPairOp::Modf.eval(&sig, &Scalar::F64(-3.5)),
            (Scalar::F64(-0.5), Scalar::F64(-3.0))
        );
        let sig = BinaryPairOp::Divmod.signature(DType::I32, DType::I32).expect("divmod loop");
        assert_eq!(sig.outputs, vec![DType::I32, DType::I32]);
        assert_eq!(
            BinaryPairOp::Divmod.eval(&sig, &Scalar::I32(-7), &Scalar::I32(3)),
            Ok((Scalar::I32(-3), Scalar::I32(2)))
        );
    }
}
