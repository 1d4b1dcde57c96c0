#![forbid(unsafe_code)]

mod distributions;
mod mt19937;
mod persist;
mod state;

pub use distributions::Distribution;
pub use persist::RandomStateSnapshot;
pub use state::{RandomState, install_thread_state, with_thread_state};

use nrt_ndarray::ArrayError;
use nrt_runtime::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RandomError {
    #[error("seed must be a non-negative integer, got {0}")]
    InvalidSeed(String),
    #[error("{name}: {detail}")]
    InvalidParameter {
        name: &'static str,
        detail: &'static str,
    },
    #[error("'{name}' does not take {count} parameter(s)")]
    ParameterCount { name: &'static str, count: usize },
    #[error("unknown distribution '{0}'")]
    UnknownDistribution(String),
    #[error("draws are scalar-only; size {0:?} is not supported")]
    SizeUnsupported(Vec<usize>),
    #[error("shuffle needs a one-dimensional sequence, got {ndim} dimension(s)")]
    NotOneDimensional { ndim: usize },
    #[error("corrupt random state: {0}")]
    CorruptState(String),
    #[error("this thread's random state is already in use")]
    ThreadStateBusy,
    #[error(transparent)]
    Array(#[from] ArrayError),
}

impl RandomError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSeed(_) => ErrorKind::InvalidSeed,
            Self::InvalidParameter { .. } | Self::ParameterCount { .. } | Self::CorruptState(_) => {
                ErrorKind::InvalidParameter
            }
            Self::UnknownDistribution(_)
            | Self::SizeUnsupported(_)
            | Self::NotOneDimensional { .. }
            | Self::ThreadStateBusy => ErrorKind::UnsupportedArgument,
            Self::Array(err) => err.kind(),
        }
    }

    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        self.kind().reason_code()
    }

    pub(crate) fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptState(detail.into())
    }
}
