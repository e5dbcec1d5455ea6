use crate::join::optional::{optional_output_metadata, OptionalMatches};
use crate::join::strategy::cardinality_product;
use crate::join::{
    combine_operations, substitute, JoinAction, JoinCoefficients, JoinEntry, JoinMediator,
    JoinProperties, PhysicalJoin,
};
use async_trait::async_trait;
use futures::future::ready;
use futures::{StreamExt, TryStreamExt};
use rdf_federation_common::error::{JoinError, JoinRejection};
use rdf_federation_common::{
    terminate_on_error, BindingStream, BindingStreamOutput, JoinResult, LogicalJoinType, Metadata,
    MetadataAccessor, QueryContext,
};
use rdf_federation_model::{Binding, GraphPattern, Variable};
use rustc_hash::FxHashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Dampens the number of iterations of a bind join by the variable overlap between the driver and
/// the remaining entries. Determined empirically.
const BIND_JOIN_OVERLAP_FACTOR: f64 = 10.0;

/// The order in which a bind join delivers the results of its driver bindings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BindOrder {
    /// Consumes the results of one driver binding before the next driver binding is read. The
    /// output is grouped by driver binding.
    #[default]
    DepthFirst,
    /// Evaluates multiple driver bindings concurrently and interleaves their results.
    BreadthFirst,
}

impl Display for BindOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BindOrder::DepthFirst => write!(f, "depth-first"),
            BindOrder::BreadthFirst => write!(f, "breadth-first"),
        }
    }
}

/// Joins entries by substituting each binding of a driver entry into the remaining operations.
///
/// The driver is the smallest entry that shares a variable with another entry. For each driver
/// binding, the remaining operations are bound, combined into a single join, and evaluated by
/// the [QueryEvaluator](rdf_federation_common::QueryEvaluator) of the action's context. The
/// entry streams of the remaining entries are never consumed.
#[derive(Debug)]
pub struct BindJoin {
    properties: JoinProperties,
    order: BindOrder,
    buffer_size: usize,
}

impl BindJoin {
    /// Creates a [BindJoin] for exactly two entries.
    pub fn binary(order: BindOrder, buffer_size: usize) -> Self {
        Self {
            properties: JoinProperties {
                name: "bind",
                join_type: LogicalJoinType::Inner,
                min_entries: 2,
                max_entries: Some(2),
                can_handle_undefs: true,
            },
            order,
            buffer_size,
        }
    }

    /// Creates a [BindJoin] for three or more entries.
    pub fn multi(order: BindOrder, buffer_size: usize) -> Self {
        Self {
            properties: JoinProperties {
                name: "multi-bind",
                join_type: LogicalJoinType::Inner,
                min_entries: 3,
                max_entries: None,
                can_handle_undefs: true,
            },
            order,
            buffer_size,
        }
    }

    pub fn order(&self) -> BindOrder {
        self.order
    }
}

#[async_trait]
impl PhysicalJoin for BindJoin {
    fn properties(&self) -> JoinProperties {
        self.properties
    }

    fn test_entries(
        &self,
        entries: &[JoinEntry],
        metadatas: &[Arc<Metadata>],
    ) -> Result<(), JoinRejection> {
        let strategy = self.properties.name;
        let driver =
            select_driver(metadatas).ok_or(JoinRejection::NoCommonVariable { strategy })?;
        check_bindable(
            strategy,
            entries
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != driver)
                .map(|(_, e)| &e.operation),
        )?;
        if driver_overlap(metadatas, driver) == 0 {
            return Err(JoinRejection::NoDriverOverlap { strategy });
        }
        Ok(())
    }

    fn estimate(&self, _entries: &[JoinEntry], metadatas: &[Arc<Metadata>]) -> JoinCoefficients {
        // Only called after `test_entries`, so there is a driver.
        let driver = select_driver(metadatas).unwrap_or_default();
        bind_join_coefficients(metadatas, driver)
    }

    async fn execute(
        &self,
        action: JoinAction,
        metadatas: Vec<Arc<Metadata>>,
        _mediator: &JoinMediator,
    ) -> JoinResult<BindingStreamOutput> {
        let Some(driver_index) = select_driver(&metadatas) else {
            return JoinError::internal("Bind join executed without a common variable.");
        };
        tracing::debug!(
            strategy = self.properties.name,
            driver = driver_index,
            order = %self.order,
            entries = metadatas.len(),
            "Selected driver entry of bind join"
        );

        let mut entries = action.entries;
        let driver = entries.remove(driver_index);
        let mut others = metadatas.clone();
        let driver_metadata = others.remove(driver_index);

        // Dropping the remaining outputs closes their streams. They are re-evaluated per binding.
        let Some(operation) = combine_operations(entries.into_iter().map(|e| e.operation)) else {
            return JoinError::internal("Bind join executed without remaining entries.");
        };
        let context = action.context.with_join_metadata(driver_metadata, others);

        let bindings = bind_bindings(
            driver.output.bindings,
            operation,
            context,
            BindPolicy {
                order: self.order,
                buffer_size: self.buffer_size,
                optional: false,
            },
        );
        Ok(BindingStreamOutput::new(
            bindings,
            MetadataAccessor::ready(Metadata::merge(metadatas.iter().map(Arc::as_ref))),
        ))
    }
}

/// Left outer join variant of the [BindJoin] for exactly two entries.
///
/// The left entry is always the driver. Left bindings without any result are emitted unchanged.
#[derive(Debug)]
pub struct OptionalBindJoin {
    order: BindOrder,
    buffer_size: usize,
}

impl OptionalBindJoin {
    /// Creates a new [OptionalBindJoin].
    pub fn new(order: BindOrder, buffer_size: usize) -> Self {
        Self { order, buffer_size }
    }
}

#[async_trait]
impl PhysicalJoin for OptionalBindJoin {
    fn properties(&self) -> JoinProperties {
        JoinProperties {
            name: "optional-bind",
            join_type: LogicalJoinType::Optional,
            min_entries: 2,
            max_entries: Some(2),
            can_handle_undefs: true,
        }
    }

    fn test_entries(
        &self,
        entries: &[JoinEntry],
        metadatas: &[Arc<Metadata>],
    ) -> Result<(), JoinRejection> {
        let strategy = self.name();
        check_bindable(strategy, entries.iter().skip(1).map(|e| &e.operation))?;
        if driver_overlap(metadatas, 0) == 0 {
            return Err(JoinRejection::NoCommonVariable { strategy });
        }
        Ok(())
    }

    fn estimate(&self, _entries: &[JoinEntry], metadatas: &[Arc<Metadata>]) -> JoinCoefficients {
        bind_join_coefficients(metadatas, 0)
    }

    async fn execute(
        &self,
        action: JoinAction,
        metadatas: Vec<Arc<Metadata>>,
        _mediator: &JoinMediator,
    ) -> JoinResult<BindingStreamOutput> {
        tracing::debug!(
            strategy = self.name(),
            order = %self.order,
            "Binding the left entry of an optional join"
        );

        let mut entries = action.entries.into_iter();
        let (Some(left), Some(right)) = (entries.next(), entries.next()) else {
            return JoinError::internal("Optional bind join executed without two entries.");
        };
        let context = action
            .context
            .with_join_metadata(Arc::clone(&metadatas[0]), metadatas[1..].to_vec());

        let bindings = bind_bindings(
            left.output.bindings,
            right.operation,
            context,
            BindPolicy {
                order: self.order,
                buffer_size: self.buffer_size,
                optional: true,
            },
        );
        Ok(BindingStreamOutput::new(
            bindings,
            MetadataAccessor::ready(optional_output_metadata(&metadatas)),
        ))
    }
}

/// Selects the driver entry of a bind join.
///
/// If an entry may contain undefined values, the first entry is the driver. Otherwise, the driver
/// is the entry with the lowest cardinality among the entries that share a variable with another
/// entry. Returns [None] if no variable is shared.
pub(super) fn select_driver(metadatas: &[Arc<Metadata>]) -> Option<usize> {
    if metadatas.iter().any(|m| m.can_contain_undefs) {
        return Some(0);
    }

    let mut occurrences = FxHashMap::<&Variable, usize>::default();
    for metadata in metadatas {
        for variable in &metadata.variables {
            *occurrences.entry(variable).or_default() += 1;
        }
    }
    let is_join_variable = |v: &Variable| occurrences.get(v).is_some_and(|count| *count >= 2);

    let mut driver: Option<(usize, f64)> = None;
    for (i, metadata) in metadatas.iter().enumerate() {
        if !metadata.variables.iter().any(is_join_variable) {
            continue;
        }
        let cardinality = metadata.cardinality.value;
        match driver {
            Some((_, smallest)) if smallest <= cardinality => {}
            _ => driver = Some((i, cardinality)),
        }
    }
    driver.map(|(i, _)| i)
}

/// The number of variables of the remaining entries that are also variables of the driver.
fn driver_overlap(metadatas: &[Arc<Metadata>], driver: usize) -> usize {
    let driver_variables = &metadatas[driver].variables;
    metadatas
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != driver)
        .map(|(_, m)| {
            m.variables
                .iter()
                .filter(|v| driver_variables.contains(v))
                .count()
        })
        .sum()
}

/// Checks that every operation can be evaluated once per driver binding.
fn check_bindable<'a>(
    strategy: &'static str,
    operations: impl IntoIterator<Item = &'a GraphPattern>,
) -> Result<(), JoinRejection> {
    for operation in operations {
        let name = match operation {
            GraphPattern::Extend { .. } => "extend",
            GraphPattern::Group { .. } => "group",
            _ => continue,
        };
        return Err(JoinRejection::UnbindableOperation {
            strategy,
            operation: name,
        });
    }
    Ok(())
}

fn bind_join_coefficients(metadatas: &[Arc<Metadata>], driver: usize) -> JoinCoefficients {
    let driver_metadata = &metadatas[driver];
    let others = metadatas
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != driver)
        .map(|(_, m)| m)
        .collect::<Vec<_>>();

    #[allow(clippy::cast_precision_loss, reason = "Variable counts are small")]
    let overlap = driver_overlap(metadatas, driver).max(1) as f64;
    let driver_cardinality = driver_metadata.cardinality.value;
    let others_cardinality = cardinality_product(others.iter().copied());
    let others_initial_time: f64 = others.iter().map(|m| m.initial_time()).sum();
    let others_item_time: f64 = others.iter().map(|m| m.item_time()).sum();

    JoinCoefficients {
        iterations: driver_cardinality * others_cardinality / (BIND_JOIN_OVERLAP_FACTOR * overlap),
        persisted_items: 0.0,
        blocking_items: 0.0,
        request_time: driver_metadata.initial_time()
            + (driver_cardinality / overlap)
                * (driver_metadata.item_time()
                    + others_initial_time
                    + others_cardinality * others_item_time),
    }
}

/// How the results of the driver bindings are delivered.
#[derive(Clone, Copy, Debug)]
struct BindPolicy {
    order: BindOrder,
    buffer_size: usize,
    /// Whether driver bindings without results are emitted on their own.
    optional: bool,
}

/// Evaluates `operation` once per binding of `driver` and joins the results with the binding.
fn bind_bindings(
    driver: BindingStream,
    operation: GraphPattern,
    context: QueryContext,
    policy: BindPolicy,
) -> BindingStream {
    let evaluate = move |binding: Binding| {
        let operation = substitute(&operation, &binding);
        let context = context.with_bound_binding(binding.clone());
        async move {
            let output = context.evaluate(&operation).await?;
            // Values that cannot be substituted (e.g., a literal as a graph name) stay variables
            // in the operation, so the sub-bindings may contradict the driver binding.
            let driver_binding = binding.clone();
            let matches = output
                .bindings
                .try_filter_map(move |sub| ready(Ok(driver_binding.merge(&sub))))
                .boxed();
            let matches: BindingStream = if policy.optional {
                Box::pin(OptionalMatches::new(binding, matches))
            } else {
                matches
            };
            Ok::<_, JoinError>(matches)
        }
    };

    let bindings = match policy.order {
        BindOrder::DepthFirst => driver.and_then(evaluate).try_flatten().boxed(),
        BindOrder::BreadthFirst => {
            let buffer_size = policy.buffer_size.max(1);
            driver
                .map_ok(evaluate)
                .try_buffer_unordered(buffer_size)
                .try_flatten_unordered(buffer_size)
                .boxed()
        }
    };
    terminate_on_error(bindings)
}
