use crate::LogicalJoinType;
use itertools::Itertools;
use std::error::Error;
use std::sync::Arc;

/// The reason why a physical join strategy cannot handle a join.
///
/// Rejections are local decisions of the strategy selection. They only reach the caller, wrapped
/// in [JoinError::NoApplicableStrategy], if every strategy rejects.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum JoinRejection {
    #[error("{strategy} requires at least {min} entries, got {actual}")]
    TooFewEntries {
        strategy: &'static str,
        min: usize,
        actual: usize,
    },
    #[error("{strategy} accepts at most {max} entries, got {actual}")]
    TooManyEntries {
        strategy: &'static str,
        max: usize,
        actual: usize,
    },
    #[error("{strategy} only handles {expected} joins, got an {actual} join")]
    JoinTypeMismatch {
        strategy: &'static str,
        expected: LogicalJoinType,
        actual: LogicalJoinType,
    },
    /// Some entry may leave variables unbound, which the strategy cannot handle.
    #[error("{strategy} cannot handle undefined values")]
    UndefinedValues { strategy: &'static str },
    #[error("{strategy} requires a variable that is shared by at least two entries")]
    NoCommonVariable { strategy: &'static str },
    #[error("{strategy} found no variable overlap between the driver and the remaining entries")]
    NoDriverOverlap { strategy: &'static str },
    /// A remaining entry cannot be evaluated once per driver binding.
    #[error("{strategy} cannot bind into {operation} operations")]
    UnbindableOperation {
        strategy: &'static str,
        operation: &'static str,
    },
}

/// An error that occurs while joining binding streams.
///
/// The error is cheap to clone such that memoized metadata and replayed streams can report the
/// same failure to all of their consumers.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum JoinError {
    /// Every registered strategy rejected the join.
    #[error(
        "No applicable join strategy for an {join_type} join of {entries} entries: {}",
        format_rejections(.rejections)
    )]
    NoApplicableStrategy {
        join_type: LogicalJoinType,
        entries: usize,
        rejections: Vec<JoinRejection>,
    },
    /// Error from a source that produces bindings or metadata.
    #[error("{0}")]
    Source(#[source] Arc<dyn Error + Send + Sync + 'static>),
    /// The evaluator does not support the given operation.
    #[error("A feature is not supported: {0}")]
    Unsupported(String),
    #[error("An internal error that likely indicates towards a bug in RDF Federation: {0}")]
    Internal(String),
}

impl JoinError {
    /// Wraps an error of an external source.
    #[inline]
    pub fn external(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self::Source(Arc::from(error.into()))
    }

    pub fn internal<T>(cause: impl Into<String>) -> Result<T, Self> {
        Err(JoinError::Internal(cause.into()))
    }
}

fn format_rejections(rejections: &[JoinRejection]) -> String {
    rejections.iter().join("; ")
}
