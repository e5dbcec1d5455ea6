use crate::join::{BindOrder, CoefficientWeights};

/// The default number of sub-streams that a breadth-first bind join keeps in flight.
pub const DEFAULT_BIND_JOIN_BUFFER_SIZE: usize = 128;

/// Holds the configuration of the join engine.
#[derive(Clone, Debug)]
pub struct JoinConfig {
    /// The maximum number of driver bindings whose sub-streams are consumed concurrently by a
    /// breadth-first bind join.
    pub bind_join_buffer_size: usize,
    /// The delivery policy of the bind joins in the default strategy registry.
    pub bind_order: BindOrder,
    /// The weights used for comparing the cost of different strategies.
    pub weights: CoefficientWeights,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            bind_join_buffer_size: DEFAULT_BIND_JOIN_BUFFER_SIZE,
            bind_order: BindOrder::DepthFirst,
            weights: CoefficientWeights::default(),
        }
    }
}
