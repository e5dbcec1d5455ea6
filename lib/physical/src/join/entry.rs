use rdf_federation_common::error::JoinError;
use rdf_federation_common::{BindingStreamOutput, JoinResult, LogicalJoinType, QueryContext};
use rdf_federation_model::GraphPattern;

/// A single operand of a join.
///
/// The `output` is consumed by at most one strategy: the one that is selected. All other
/// strategies may only look at the metadata.
pub struct JoinEntry {
    /// The operation that produced `output`. Bind joins substitute values into this operation.
    pub operation: GraphPattern,
    pub output: BindingStreamOutput,
}

impl JoinEntry {
    /// Creates a new [JoinEntry].
    pub fn new(operation: GraphPattern, output: BindingStreamOutput) -> Self {
        Self { operation, output }
    }
}

/// A join that should be executed.
pub struct JoinAction {
    pub join_type: LogicalJoinType,
    /// The operands of the join. For optional joins, the first entry is the left-hand side.
    pub entries: Vec<JoinEntry>,
    pub context: QueryContext,
}

impl JoinAction {
    /// Creates a new [JoinAction].
    pub fn new(join_type: LogicalJoinType, entries: Vec<JoinEntry>, context: QueryContext) -> Self {
        Self {
            join_type,
            entries,
            context,
        }
    }
}

/// Splits a binary join into its two entries.
pub(super) fn into_pair(entries: Vec<JoinEntry>) -> JoinResult<(JoinEntry, JoinEntry)> {
    let [left, right] = <[JoinEntry; 2]>::try_from(entries).map_err(|entries| {
        JoinError::Internal(format!(
            "Binary join executed with {} entries.",
            entries.len()
        ))
    })?;
    Ok((left, right))
}
