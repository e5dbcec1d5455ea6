use crate::join::{JoinAction, JoinCoefficients, JoinEntry, JoinMediator};
use async_trait::async_trait;
use rdf_federation_common::error::JoinRejection;
use rdf_federation_common::{BindingStreamOutput, JoinResult, LogicalJoinType, Metadata};
use std::fmt::Debug;
use std::sync::Arc;

/// The static properties of a [PhysicalJoin] that are checked before any strategy-specific test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinProperties {
    /// The name of the strategy, used in rejections and logs.
    pub name: &'static str,
    pub join_type: LogicalJoinType,
    pub min_entries: usize,
    /// [None] if the strategy handles an arbitrary number of entries.
    pub max_entries: Option<usize>,
    /// Whether the strategy can join entries whose bindings may leave variables unbound.
    pub can_handle_undefs: bool,
}

impl JoinProperties {
    /// Checks the arity, the join type, and the undefined-value restrictions.
    pub fn check(
        &self,
        join_type: LogicalJoinType,
        metadatas: &[Arc<Metadata>],
    ) -> Result<(), JoinRejection> {
        let actual = metadatas.len();
        if actual < self.min_entries {
            return Err(JoinRejection::TooFewEntries {
                strategy: self.name,
                min: self.min_entries,
                actual,
            });
        }
        if let Some(max) = self.max_entries {
            if actual > max {
                return Err(JoinRejection::TooManyEntries {
                    strategy: self.name,
                    max,
                    actual,
                });
            }
        }
        if join_type != self.join_type {
            return Err(JoinRejection::JoinTypeMismatch {
                strategy: self.name,
                expected: self.join_type,
                actual: join_type,
            });
        }
        if !self.can_handle_undefs && metadatas.iter().any(|m| m.can_contain_undefs) {
            return Err(JoinRejection::UndefinedValues {
                strategy: self.name,
            });
        }
        Ok(())
    }
}

/// A physical join strategy.
///
/// [Self::test] and [Self::estimate] only look at the operations and the metadata of the entries.
/// They must never read from a binding stream, as the streams are only consumed by the strategy
/// that is eventually executed.
#[async_trait]
pub trait PhysicalJoin: Debug + Send + Sync {
    /// Returns the static properties of this strategy.
    fn properties(&self) -> JoinProperties;

    /// Returns the name of this strategy.
    fn name(&self) -> &'static str {
        self.properties().name
    }

    /// Checks whether this strategy can execute a join of `join_type` over `entries`.
    ///
    /// `metadatas` holds the resolved metadata of each entry.
    fn test(
        &self,
        join_type: LogicalJoinType,
        entries: &[JoinEntry],
        metadatas: &[Arc<Metadata>],
    ) -> Result<(), JoinRejection> {
        self.properties().check(join_type, metadatas)?;
        self.test_entries(entries, metadatas)
    }

    /// Strategy-specific checks that run after the checks of [JoinProperties].
    fn test_entries(
        &self,
        _entries: &[JoinEntry],
        _metadatas: &[Arc<Metadata>],
    ) -> Result<(), JoinRejection> {
        Ok(())
    }

    /// Estimates the cost of executing the join with this strategy.
    ///
    /// Only called for entries that passed [Self::test].
    fn estimate(&self, entries: &[JoinEntry], metadatas: &[Arc<Metadata>]) -> JoinCoefficients;

    /// Executes the join.
    ///
    /// `mediator` is used for joins that the strategy creates itself, for example, when reducing
    /// an N-ary join to binary joins.
    async fn execute(
        &self,
        action: JoinAction,
        metadatas: Vec<Arc<Metadata>>,
        mediator: &JoinMediator,
    ) -> JoinResult<BindingStreamOutput>;
}

/// The summed request time of fully reading every entry once.
pub(super) fn sequential_request_time(metadatas: &[Arc<Metadata>]) -> f64 {
    metadatas
        .iter()
        .map(|m| m.initial_time() + m.cardinality.value * m.item_time())
        .sum()
}

/// The product of the cardinalities of all entries.
pub(super) fn cardinality_product<'a>(
    metadatas: impl IntoIterator<Item = &'a Arc<Metadata>>,
) -> f64 {
    metadatas
        .into_iter()
        .map(|m| m.cardinality.value)
        .product()
}
