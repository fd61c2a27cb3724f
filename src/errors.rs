use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Coarse failure categories, used by callers to decide what is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    ReferentialIntegrity,
    Connectivity,
    Arithmetic,
    Lookup,
    State,
}

/// A formula that could not be compiled. Carries the source text and the
/// offending span so it can be rendered as a diagnostic.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
#[error("Malformed impedance formula `{formula}`: {message}")]
#[diagnostic(code(ground_solve::formula))]
pub struct FormulaError {
    #[source_code]
    pub formula: String,
    pub message: String,
    #[label("here")]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GroundingError {
    #[error(transparent)]
    Formula(#[from] FormulaError),
    #[error("Formula `{formula}` references `{variable}` but no value was supplied")]
    MissingVariable { variable: String, formula: String },
    #[error("Frequency list is empty")]
    EmptyFrequencies,
    #[error("Invalid frequency: {0} Hz (must be ≥ 0 and finite)")]
    InvalidFrequency(f64),
    #[error("{kind} `{name}` already exists")]
    DuplicateName { kind: &'static str, name: String },
    #[error("Network assistant needs {needed} branch lengths, got {supplied}")]
    MissingBranchLengths { needed: usize, supplied: usize },
    #[error("{entity} `{name}` references unknown bus `{bus}`")]
    UnknownBus {
        entity: &'static str,
        name: String,
        bus: String,
    },
    #[error("Bus `{bus}` is still referenced by {entity} `{name}`")]
    BusInUse {
        bus: String,
        entity: &'static str,
        name: String,
    },
    #[error("Bus `{to}` is unreachable from bus `{from}`")]
    Unreachable { from: String, to: String },
    #[error("Arithmetic error: {context}{}", at_hz(.frequency))]
    Arithmetic {
        context: String,
        frequency: Option<f64>,
    },
    #[error("Unknown {kind} `{name}`")]
    NotFound { kind: &'static str, name: String },
    #[error("Network `{0}` has no analysis frequencies configured")]
    NoFrequencies(String),
}

pub type GroundingResult<T> = Result<T, GroundingError>;

fn at_hz(frequency: &Option<f64>) -> String {
    match frequency {
        Some(hz) => format!(" at {hz} Hz"),
        None => String::new(),
    }
}

impl GroundingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Formula(_)
            | Self::MissingVariable { .. }
            | Self::EmptyFrequencies
            | Self::InvalidFrequency(_)
            | Self::DuplicateName { .. }
            | Self::MissingBranchLengths { .. } => ErrorKind::Input,
            Self::UnknownBus { .. } | Self::BusInUse { .. } => ErrorKind::ReferentialIntegrity,
            Self::Unreachable { .. } => ErrorKind::Connectivity,
            Self::Arithmetic { .. } => ErrorKind::Arithmetic,
            Self::NotFound { .. } => ErrorKind::Lookup,
            Self::NoFrequencies(_) => ErrorKind::State,
        }
    }

    pub(crate) fn arithmetic(context: impl Into<String>) -> Self {
        Self::Arithmetic {
            context: context.into(),
            frequency: None,
        }
    }

    pub(crate) fn not_found(kind: &'static str, name: &str) -> Self {
        Self::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// Attaches the frequency to an arithmetic error that was raised without one.
    pub fn at_frequency(self, hz: f64) -> Self {
        match self {
            Self::Arithmetic {
                context,
                frequency: None,
            } => Self::Arithmetic {
                context,
                frequency: Some(hz),
            },
            other => other,
        }
    }
}
