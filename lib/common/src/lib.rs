//! The contract between the join engine of RDF Federation and its collaborators.
//!
//! Every operand of a join is a [BindingStreamOutput]: a lazy stream of bindings together with a
//! memoized accessor for its [Metadata]. Sub-queries are evaluated by a [QueryEvaluator] that
//! receives an immutable [QueryContext].

mod context;
pub mod error;
mod evaluator;
mod join_type;
mod metadata;
mod replay;
mod stream;

pub use context::QueryContext;
pub use evaluator::QueryEvaluator;
pub use join_type::LogicalJoinType;
pub use metadata::{Cardinality, CardinalityKind, Metadata, MetadataAccessor};
pub use replay::{ReplayCursor, ReplayableBindings};
pub use stream::{terminate_on_error, BindingStream, BindingStreamOutput, TerminateOnError};

pub type JoinResult<T> = Result<T, error::JoinError>;
