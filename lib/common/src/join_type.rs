use std::fmt::{Display, Formatter};

/// The logical type of a join. It decides what happens with left bindings that have no join
/// partner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalJoinType {
    /// Unmatched bindings are dropped.
    Inner,
    /// Unmatched left bindings are kept (SPARQL `OPTIONAL`).
    Optional,
}

impl Display for LogicalJoinType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalJoinType::Inner => write!(f, "inner"),
            LogicalJoinType::Optional => write!(f, "optional"),
        }
    }
}
