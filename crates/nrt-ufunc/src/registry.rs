use std::collections::HashMap;
use std::sync::OnceLock;

use nrt_dtype::{DType, Scalar};
use nrt_runtime::{ExecutionMode, Platform};

use crate::kernels::{BinaryOp, BinaryPairOp, DomainError, LoopSignature, UnaryOp, UnaryPairOp};

/// Element kernel behind a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Unary(UnaryOp),
    Binary(BinaryOp),
    UnaryPair(UnaryPairOp),
    BinaryPair(BinaryPairOp),
}

impl Kernel {
    #[must_use]
    pub const fn nin(self) -> usize {
        match self {
            Self::Unary(_) | Self::UnaryPair(_) => 1,
            Self::Binary(_) | Self::BinaryPair(_) => 2,
        }
    }

    #[must_use]
    pub const fn nout(self) -> usize {
        match self {
            Self::Unary(_) | Self::Binary(_) => 1,
            Self::UnaryPair(_) | Self::BinaryPair(_) => 2,
        }
    }

    /// Loop dtypes for the given input dtypes, or `None` when no loop exists.
    pub(crate) fn signature(self, inputs: &[DType]) -> Option<LoopSignature> {
        match (self, inputs) {
            (Self::Unary(op), &[x]) => op.signature(x),
            (Self::Binary(op), &[a, b]) => op.signature(a, b),
            (Self::UnaryPair(op), &[x]) => op.signature(x),
            (Self::BinaryPair(op), &[a, b]) => op.signature(a, b),
            _ => None,
        }
    }

    /// Evaluates one element; `args` are already cast to the loop dtypes.
    pub(crate) fn eval(
        self,
        sig: &LoopSignature,
        args: &[&Scalar],
    ) -> Result<(Scalar, Option<Scalar>), DomainError> {
        match (self, args) {
            (Self::Unary(op), [x]) => Ok((op.eval(sig, x)?, None)),
            (Self::Binary(op), [a, b]) => Ok((op.eval(sig, a, b)?, None)),
            (Self::UnaryPair(op), [x]) => {
                let (first, second) = op.eval(sig, x);
                Ok((first, Some(second)))
            }
            (Self::BinaryPair(op), [a, b]) => {
                let (first, second) = op.eval(sig, a, b)?;
                Ok((first, Some(second)))
            }
            _ => Err(DomainError("operand count does not match kernel arity")),
        }
    }
}

/// A kernel that is unavailable on one OS / word-size combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCaveat {
    pub os: &'static str,
    pub pointer_width: u32,
    pub reason: &'static str,
}

/// Registry entry describing one named ufunc and its capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UfuncSpec {
    pub name: &'static str,
    pub kernel: Kernel,
    pub supported_in_compiled: bool,
    pub supported_in_fallback: bool,
    /// Array operands must come with an explicit output array.
    pub requires_output: bool,
    pub caveat: Option<PlatformCaveat>,
}

impl UfuncSpec {
    const fn new(name: &'static str, kernel: Kernel) -> Self {
        Self {
            name,
            kernel,
            supported_in_compiled: true,
            supported_in_fallback: true,
            requires_output: false,
            caveat: None,
        }
    }

    const fn unary(name: &'static str, op: UnaryOp) -> Self {
        Self::new(name, Kernel::Unary(op))
    }

    const fn binary(name: &'static str, op: BinaryOp) -> Self {
        Self::new(name, Kernel::Binary(op))
    }

    const fn with_output(mut self) -> Self {
        self.requires_output = true;
        self
    }

    const fn fallback_only(mut self) -> Self {
        self.supported_in_compiled = false;
        self
    }

    const fn with_caveat(mut self, caveat: PlatformCaveat) -> Self {
        self.caveat = Some(caveat);
        self
    }

    #[must_use]
    pub const fn arity(&self) -> usize {
        self.kernel.nin()
    }

    #[must_use]
    pub const fn nout(&self) -> usize {
        self.kernel.nout()
    }

    #[must_use]
    pub const fn supports(&self, mode: ExecutionMode) -> bool {
        match mode {
            ExecutionMode::Compiled => self.supported_in_compiled,
            ExecutionMode::Fallback => self.supported_in_fallback,
        }
    }

    /// The caveat that disables this ufunc on `platform`, if any.
    #[must_use]
    pub fn blocked_on(&self, platform: &Platform) -> Option<&PlatformCaveat> {
        self.caveat
            .as_ref()
            .filter(|caveat| platform.matches(caveat.os, caveat.pointer_width))
    }
}

const LDEXP_CAVEAT: PlatformCaveat = PlatformCaveat {
    os: "windows",
    pointer_width: 32,
    reason: "the C long exponent argument is 32 bits wide",
};

static TABLE: &[UfuncSpec] = &[
    // arithmetic
    UfuncSpec::binary("add", BinaryOp::Add),
    UfuncSpec::binary("subtract", BinaryOp::Subtract),
    UfuncSpec::binary("multiply", BinaryOp::Multiply).with_output(),
    UfuncSpec::binary("divide", BinaryOp::Divide).with_output(),
    UfuncSpec::binary("true_divide", BinaryOp::Divide).with_output(),
    UfuncSpec::binary("floor_divide", BinaryOp::FloorDivide).with_output(),
    UfuncSpec::binary("remainder", BinaryOp::Remainder).with_output(),
    UfuncSpec::binary("mod", BinaryOp::Remainder).with_output(),
    UfuncSpec::binary("fmod", BinaryOp::Fmod).with_output(),
    UfuncSpec::binary("power", BinaryOp::Power).with_output(),
    UfuncSpec::binary("maximum", BinaryOp::Maximum),
    UfuncSpec::binary("minimum", BinaryOp::Minimum),
    UfuncSpec::binary("fmax", BinaryOp::Fmax),
    UfuncSpec::binary("fmin", BinaryOp::Fmin),
    UfuncSpec::binary("arctan2", BinaryOp::Arctan2).with_output(),
    UfuncSpec::binary("hypot", BinaryOp::Hypot).with_output(),
    UfuncSpec::binary("copysign", BinaryOp::Copysign).with_output(),
    UfuncSpec::binary("logaddexp", BinaryOp::Logaddexp).with_output(),
    UfuncSpec::binary("ldexp", BinaryOp::Ldexp)
        .with_output()
        .with_caveat(LDEXP_CAVEAT),
    // comparisons
    UfuncSpec::binary("equal", BinaryOp::Equal),
    UfuncSpec::binary("not_equal", BinaryOp::NotEqual),
    UfuncSpec::binary("less", BinaryOp::Less),
    UfuncSpec::binary("less_equal", BinaryOp::LessEqual),
    UfuncSpec::binary("greater", BinaryOp::Greater),
    UfuncSpec::binary("greater_equal", BinaryOp::GreaterEqual),
    // logical and bitwise
    UfuncSpec::binary("logical_and", BinaryOp::LogicalAnd),
    UfuncSpec::binary("logical_or", BinaryOp::LogicalOr),
    UfuncSpec::binary("logical_xor", BinaryOp::LogicalXor),
    UfuncSpec::unary("logical_not", UnaryOp::LogicalNot),
    UfuncSpec::binary("bitwise_and", BinaryOp::BitwiseAnd),
    UfuncSpec::binary("bitwise_or", BinaryOp::BitwiseOr),
    UfuncSpec::binary("bitwise_xor", BinaryOp::BitwiseXor),
    UfuncSpec::unary("invert", UnaryOp::Invert),
    UfuncSpec::unary("bitwise_not", UnaryOp::Invert),
    UfuncSpec::binary("left_shift", BinaryOp::LeftShift),
    UfuncSpec::binary("right_shift", BinaryOp::RightShift),
    // unary math
    UfuncSpec::unary("negative", UnaryOp::Negative),
    UfuncSpec::unary("absolute", UnaryOp::Absolute),
    UfuncSpec::unary("abs", UnaryOp::Absolute),
    UfuncSpec::unary("sign", UnaryOp::Sign),
    UfuncSpec::unary("sqrt", UnaryOp::Sqrt),
    UfuncSpec::unary("square", UnaryOp::Square),
    UfuncSpec::unary("reciprocal", UnaryOp::Reciprocal),
    UfuncSpec::unary("cbrt", UnaryOp::Cbrt),
    UfuncSpec::unary("exp", UnaryOp::Exp),
    UfuncSpec::unary("exp2", UnaryOp::Exp2),
    UfuncSpec::unary("expm1", UnaryOp::Expm1),
    UfuncSpec::unary("log", UnaryOp::Log),
    UfuncSpec::unary("log2", UnaryOp::Log2),
    UfuncSpec::unary("log10", UnaryOp::Log10),
    UfuncSpec::unary("log1p", UnaryOp::Log1p),
    UfuncSpec::unary("sin", UnaryOp::Sin),
    UfuncSpec::unary("cos", UnaryOp::Cos),
    UfuncSpec::unary("tan", UnaryOp::Tan),
    UfuncSpec::unary("arcsin", UnaryOp::Arcsin),
    UfuncSpec::unary("arccos", UnaryOp::Arccos),
    UfuncSpec::unary("arctan", UnaryOp::Arctan),
    UfuncSpec::unary("sinh", UnaryOp::Sinh),
    UfuncSpec::unary("cosh", UnaryOp::Cosh),
    UfuncSpec::unary("tanh", UnaryOp::Tanh),
    UfuncSpec::unary("floor", UnaryOp::Floor),
    UfuncSpec::unary("ceil", UnaryOp::Ceil),
    UfuncSpec::unary("trunc", UnaryOp::Trunc),
    UfuncSpec::unary("rint", UnaryOp::Rint),
    UfuncSpec::unary("deg2rad", UnaryOp::Deg2rad),
    UfuncSpec::unary("radians", UnaryOp::Deg2rad),
    UfuncSpec::unary("rad2deg", UnaryOp::Rad2deg),
    UfuncSpec::unary("degrees", UnaryOp::Rad2deg),
    UfuncSpec::unary("conjugate", UnaryOp::Conjugate),
    UfuncSpec::unary("conj", UnaryOp::Conjugate),
    UfuncSpec::unary("isnan", UnaryOp::IsNan),
    UfuncSpec::unary("isinf", UnaryOp::IsInf),
    UfuncSpec::unary("isfinite", UnaryOp::IsFinite),
    // two outputs
    UfuncSpec::new("modf", Kernel::UnaryPair(UnaryPairOp::Modf)).fallback_only(),
    UfuncSpec::new("frexp", Kernel::UnaryPair(UnaryPairOp::Frexp)).fallback_only(),
    UfuncSpec::new("divmod", Kernel::BinaryPair(BinaryPairOp::Divmod))
        .with_output()
        .fallback_only(),
];

fn index() -> &'static HashMap<&'static str, &'static UfuncSpec> {
    static INDEX: OnceLock<HashMap<&'static str, &'static UfuncSpec>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let index: HashMap<_, _> = TABLE.iter().map(|spec| (spec.name, spec)).collect();
        log::debug!("ufunc registry built with {} entries", index.len());
        index
    })
}

/// Looks up a ufunc by exact name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static UfuncSpec> {
    index().get(name).copied()
}

/// Every registered ufunc, in table order.
#[must_use]
pub fn registry() -> &'static [UfuncSpec] {
    TABLE
}
