#![forbid(unsafe_code)]

mod dispatch;
mod kernels;
mod reduce;
mod registry;

pub use dispatch::Dispatcher;
pub use kernels::{BinaryOp, BinaryPairOp, LoopSignature, UnaryOp, UnaryPairOp};
pub use reduce::{ReduceOp, ReduceOptions, reduce, reduce_std, reduce_var, reduce_with};
pub use registry::{Kernel, PlatformCaveat, UfuncSpec, lookup, registry};

use nrt_dtype::{DType, Descr, Scalar, TypeError};
use nrt_ndarray::{ArrayError, ArrayValue};
use nrt_runtime::{ErrorKind, ExecutionMode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UFuncError {
    #[error("unknown ufunc '{0}'")]
    UnknownUfunc(String),
    #[error("'{0}' cannot be used as a reduction")]
    NotReducible(String),
    #[error("ufunc '{name}' is not supported in {} mode", mode.as_str())]
    UnsupportedMode { name: String, mode: ExecutionMode },
    #[error("ufunc '{name}' is disabled on {os}/{pointer_width}-bit: {reason}")]
    PlatformCaveat {
        name: String,
        os: String,
        pointer_width: u32,
        reason: &'static str,
    },
    #[error("ufunc '{name}' takes {expected} operand(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("ufunc '{name}' requires an explicit output for array operands")]
    OutputRequired { name: String },
    #[error("ufunc '{name}' writes {expected} output(s), got {actual}")]
    OutputCount {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("output shape {actual:?} does not match broadcast shape {expected:?}")]
    OutputShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("cannot cast '{name}' result from {from} to output {to} under same_kind casting")]
    OutputCast { name: String, from: String, to: String },
    #[error("'{name}' has no loop for input types ({dtypes})")]
    NoLoop { name: String, dtypes: String },
    #[error("{name}: {detail}")]
    Domain { name: String, detail: &'static str },
    #[error("zero-size reduction '{op}' has no identity")]
    EmptyReduction { op: &'static str },
    #[error(transparent)]
    Array(#[from] ArrayError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl UFuncError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownUfunc(_) => ErrorKind::UnknownUfunc,
            Self::NotReducible(_) | Self::Arity { .. } | Self::OutputCount { .. } => {
                ErrorKind::UnsupportedArgument
            }
            Self::UnsupportedMode { .. } | Self::PlatformCaveat { .. } => ErrorKind::UnsupportedMode,
            Self::OutputRequired { .. } => ErrorKind::OutputRequired,
            Self::OutputShape { .. } => ErrorKind::Broadcast,
            Self::OutputCast { .. } | Self::NoLoop { .. } | Self::Domain { .. } => ErrorKind::DType,
            Self::EmptyReduction { .. } => ErrorKind::EmptyReduction,
            Self::Array(err) => err.kind(),
            Self::Type(err) => err.kind(),
        }
    }

    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        self.kind().reason_code()
    }

    pub(crate) fn no_loop<'a>(name: &str, descrs: impl IntoIterator<Item = &'a Descr>) -> Self {
        Self::NoLoop {
            name: name.to_string(),
            dtypes: descrs
                .into_iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Positional ufunc argument.
#[derive(Debug, Clone)]
pub enum Operand {
    Scalar(Scalar),
    Array(ArrayValue),
}

impl Operand {
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Scalars are rank 0 and broadcast against any shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Scalar(_) => &[],
            Self::Array(array) => array.shape(),
        }
    }

    #[must_use]
    pub fn descr(&self) -> Descr {
        match self {
            Self::Scalar(value) => value.descr(),
            Self::Array(array) => array.descr().clone(),
        }
    }

    #[must_use]
    pub fn dtype(&self) -> Option<DType> {
        self.descr().as_dtype()
    }

    /// Elements in row-major order.
    pub(crate) fn values(&self) -> Vec<Scalar> {
        match self {
            Self::Scalar(value) => vec![value.clone()],
            Self::Array(array) => array.to_scalars(),
        }
    }
}

impl From<Scalar> for Operand {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<ArrayValue> for Operand {
    fn from(array: ArrayValue) -> Self {
        Self::Array(array)
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Self::Scalar(Scalar::F64(value))
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::I64(value))
    }
}

#[derive(Debug, Clone)]
pub enum UfuncResult {
    Scalar(Scalar),
    Pair(Scalar, Scalar),
    Array(ArrayValue),
    ArrayPair(ArrayValue, ArrayValue),
}

impl UfuncResult {
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_scalar(self) -> Option<Scalar> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_array(self) -> Option<ArrayValue> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_pair(self) -> Option<(Operand, Operand)> {
        match self {
            Self::Pair(a, b) => Some((a.into(), b.into())),
            Self::ArrayPair(a, b) => Some((a.into(), b.into())),
            _ => None,
        }
    }

    /// Shape of the (first) result; scalars are rank 0.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Scalar(_) | Self::Pair(..) => &[],
            Self::Array(array) | Self::ArrayPair(array, _) => array.shape(),
        }
    }
}
