use log::{error, warn};

/// Everything that can go wrong while configuring a delay line.
///
/// None of these abort processing: the caller has already substituted a safe
/// value by the time one of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DelayError {
    #[error("no delay writer named '{0}'")]
    UnknownWriter(String),

    #[error("delay writer '{0}' is defined more than once; keeping the first")]
    DuplicateWriter(String),

    #[error("wet/dry mix must be in the range [0, 1], got {0}; using 0")]
    WetDryOutOfRange(f32),

    #[error("feedback must be in the range [0, 0.99], got {0}; using 0")]
    FeedbackOutOfRange(f32),

    #[error("tap count must be between 1 and {max}, got {requested}")]
    InvalidTapCount { requested: usize, max: usize },

    #[error("feedback tap {requested} is outside 1..={taps}; using tap 1")]
    InvalidFeedbackTap { requested: usize, taps: usize },

    #[error("unable to allocate a delay buffer of {requested} samples")]
    Allocation { requested: usize },

    #[error("block size {block_size} is larger than the delay buffer ({capacity} samples)")]
    BlockExceedsCapacity { block_size: usize, capacity: usize },

    #[error("invalid system parameters: block size {block_size}, sample rate {sample_rate}")]
    InvalidSystemParams { block_size: usize, sample_rate: f32 },

    #[error("{node} does not accept the {param} parameter")]
    UnsupportedParam { node: &'static str, param: &'static str },

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("node {node} has no {port} port")]
    UnknownPort { node: usize, port: String },

    #[error("failed to parse patch: {0}")]
    Patch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Capacity,
    BlockSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl DelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DelayError::Allocation { .. } => ErrorKind::Capacity,
            DelayError::BlockExceedsCapacity { .. } => ErrorKind::BlockSize,
            _ => ErrorKind::Configuration,
        }
    }

    pub fn severity(&self) -> Severity {
        match self.kind() {
            ErrorKind::Configuration => Severity::Warning,
            ErrorKind::Capacity | ErrorKind::BlockSize => Severity::Error,
        }
    }
}

impl From<serde_json::Error> for DelayError {
    fn from(err: serde_json::Error) -> Self {
        DelayError::Patch(err.to_string())
    }
}

/// A non-fatal message for the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub source: String,
    pub error: DelayError,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source, self.error)
    }
}

/// Collects diagnostics raised during configuration and mirrors them to the
/// `log` facade.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, source: &str, error: DelayError) {
        let diagnostic = Diagnostic {
            severity: error.severity(),
            source: source.to_string(),
            error,
        };
        match diagnostic.severity {
            Severity::Warning => warn!("{}", diagnostic),
            Severity::Error => error!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    /// Reports `result` if it is an error and hands it back unchanged.
    pub fn record<T>(&mut self, source: &str, result: Result<T, DelayError>) -> Result<T, DelayError> {
        if let Err(err) = &result {
            self.report(source, err.clone());
        }
        result
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            DelayError::UnknownWriter("buf1".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            DelayError::Allocation { requested: 8 }.severity(),
            Severity::Error
        );
        assert_eq!(
            DelayError::BlockExceedsCapacity {
                block_size: 64,
                capacity: 8
            }
            .kind(),
            ErrorKind::BlockSize
        );
    }

    #[test]
    fn test_record_keeps_result_and_logs_once() {
        let mut diagnostics = Diagnostics::new();
        let ok: Result<u32, DelayError> = Ok(3);
        assert_eq!(diagnostics.record("multitap", ok), Ok(3));
        assert!(diagnostics.is_empty());

        let err: Result<u32, DelayError> = Err(DelayError::FeedbackOutOfRange(1.5));
        assert!(diagnostics.record("multitap", err).is_err());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.entries()[0].source, "multitap");
        assert_eq!(diagnostics.take().len(), 1);
        assert!(diagnostics.is_empty());
    }
}
