/// The estimated cost of executing a join with a particular strategy.
///
/// All values are non-negative and lower is better. The [JoinMediator](super::JoinMediator)
/// combines them into a single scalar with [CoefficientWeights].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JoinCoefficients {
    /// The number of binding comparisons.
    pub iterations: f64,
    /// The number of bindings that must be kept in memory.
    pub persisted_items: f64,
    /// The number of bindings that must be consumed before the first result can be produced.
    pub blocking_items: f64,
    /// The estimated time spent waiting for sources.
    pub request_time: f64,
}

/// The weights that turn [JoinCoefficients] into a single cost value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoefficientWeights {
    pub cpu: f64,
    pub memory: f64,
    pub time: f64,
    pub io: f64,
}

impl CoefficientWeights {
    /// Computes the weighted sum of `coefficients`.
    pub fn cost(&self, coefficients: &JoinCoefficients) -> f64 {
        coefficients.iterations * self.cpu
            + coefficients.persisted_items * self.memory
            + coefficients.blocking_items * self.time
            + coefficients.request_time * self.io
    }
}

impl Default for CoefficientWeights {
    fn default() -> Self {
        Self {
            cpu: 10.0,
            memory: 1.0,
            time: 2.0,
            io: 10.0,
        }
    }
}
