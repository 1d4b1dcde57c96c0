#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Environment variable consulted by [`RuntimeConfig::from_env`].
pub const EXECUTION_MODE_ENV: &str = "NRT_EXECUTION_MODE";

/// Which execution path the front-end compiled the calling unit for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Fully compiled path: no dynamic-object fallback is available.
    Compiled,
    /// Fallback path: broader operation set, slower.
    Fallback,
}

impl ExecutionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compiled => "compiled",
            Self::Fallback => "fallback",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compiled" | "nopython" => Some(Self::Compiled),
            "fallback" | "object" => Some(Self::Fallback),
            _ => None,
        }
    }
}

/// Operating system and word size the runtime is executing on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub pointer_width: u32,
}

impl Platform {
    #[must_use]
    pub fn new(os: impl Into<String>, pointer_width: u32) -> Self {
        Self {
            os: os.into(),
            pointer_width,
        }
    }

    /// The platform this crate was built for.
    #[must_use]
    pub fn host() -> Self {
        let pointer_width = if cfg!(target_pointer_width = "64") {
            64
        } else if cfg!(target_pointer_width = "32") {
            32
        } else {
            16
        };
        Self::new(std::env::consts::OS, pointer_width)
    }

    #[must_use]
    pub fn matches(&self, os: &str, pointer_width: u32) -> bool {
        self.os == os && self.pointer_width == pointer_width
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::host()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown execution mode '{0}' (expected 'compiled' or 'fallback')")]
    UnknownMode(String),
    #[error("invalid runtime config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub mode: ExecutionMode,
    pub platform: Platform,
    pub record_decisions: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Compiled,
            platform: Platform::host(),
            record_decisions: false,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn with_mode(mode: ExecutionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Defaults overlaid with `NRT_EXECUTION_MODE` when it is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(EXECUTION_MODE_ENV) {
            config.mode = ExecutionMode::parse(&raw).ok_or(ConfigError::UnknownMode(raw))?;
            log::debug!("execution mode from environment: {}", config.mode.as_str());
        }
        Ok(config)
    }
}

/// The error taxonomy shared by every runtime component. Each crate-level
/// error maps onto exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedType,
    FieldNotFound,
    TypeMismatch,
    IndexOutOfRange,
    NonExportableView,
    UnsupportedIndexing,
    UnknownUfunc,
    UnsupportedMode,
    OutputRequired,
    Broadcast,
    DType,
    EmptyReduction,
    InvalidSeed,
    InvalidParameter,
    UnsupportedArgument,
}

pub const ERROR_KIND_REASON_CODES: [&str; 15] = [
    "unsupported_type",
    "field_not_found",
    "type_mismatch",
    "index_out_of_range",
    "non_exportable_view",
    "unsupported_indexing",
    "unknown_ufunc",
    "unsupported_mode",
    "output_required",
    "broadcast",
    "dtype",
    "empty_reduction",
    "invalid_seed",
    "invalid_parameter",
    "unsupported_argument",
];

impl ErrorKind {
    pub const ALL: [Self; 15] = [
        Self::UnsupportedType,
        Self::FieldNotFound,
        Self::TypeMismatch,
        Self::IndexOutOfRange,
        Self::NonExportableView,
        Self::UnsupportedIndexing,
        Self::UnknownUfunc,
        Self::UnsupportedMode,
        Self::OutputRequired,
        Self::Broadcast,
        Self::DType,
        Self::EmptyReduction,
        Self::InvalidSeed,
        Self::InvalidParameter,
        Self::UnsupportedArgument,
    ];

    #[must_use]
    pub const fn reason_code(self) -> &'static str {
        match self {
            Self::UnsupportedType => "unsupported_type",
            Self::FieldNotFound => "field_not_found",
            Self::TypeMismatch => "type_mismatch",
            Self::IndexOutOfRange => "index_out_of_range",
            Self::NonExportableView => "non_exportable_view",
            Self::UnsupportedIndexing => "unsupported_indexing",
            Self::UnknownUfunc => "unknown_ufunc",
            Self::UnsupportedMode => "unsupported_mode",
            Self::OutputRequired => "output_required",
            Self::Broadcast => "broadcast",
            Self::DType => "dtype",
            Self::EmptyReduction => "empty_reduction",
            Self::InvalidSeed => "invalid_seed",
            Self::InvalidParameter => "invalid_parameter",
            Self::UnsupportedArgument => "unsupported_argument",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason_code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionAction {
    Allow,
    Reject(ErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchDecision {
    pub ts_millis: u128,
    pub op: String,
    pub mode: ExecutionMode,
    pub action: DecisionAction,
    pub note: String,
}

/// Append-only record of dispatch outcomes, owned by one dispatcher.
#[derive(Debug, Default, Clone)]
pub struct DecisionLedger {
    events: Vec<DispatchDecision>,
}

impl DecisionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: DispatchDecision) {
        self.events.push(event);
    }

    #[must_use]
    pub fn events(&self) -> &[DispatchDecision] {
        &self.events
    }

    #[must_use]
    pub fn last(&self) -> Option<&DispatchDecision> {
        self.events.last()
    }

    #[must_use]
    pub fn rejections(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event.action, DecisionAction::Reject(_)))
            .count()
    }
}

pub fn record_decision(
    ledger: &mut DecisionLedger,
    op: impl Into<String>,
    mode: ExecutionMode,
    action: DecisionAction,
    note: impl Into<String>,
) {
    let ts_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    ledger.record(DispatchDecision {
        ts_millis,
        op: op.into(),
        mode,
        action,
        note: note.into(),
    });
}
