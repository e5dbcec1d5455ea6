use crate::JoinResult;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use itertools::Itertools;
use rdf_federation_model::Variable;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

/// Whether a [Cardinality] is known precisely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CardinalityKind {
    Exact,
    Estimate,
}

/// The (estimated) number of bindings in a stream.
///
/// The value is a float as sources may report infinite or fractional estimates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cardinality {
    pub kind: CardinalityKind,
    pub value: f64,
}

impl Cardinality {
    pub fn exact(value: f64) -> Self {
        Self {
            kind: CardinalityKind::Exact,
            value,
        }
    }

    pub fn estimate(value: f64) -> Self {
        Self {
            kind: CardinalityKind::Estimate,
            value,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.kind == CardinalityKind::Exact
    }

    /// Returns true if the stream is known to produce no bindings at all.
    pub fn is_exactly_empty(&self) -> bool {
        self.is_exact() && self.value == 0.0
    }
}

/// Statistics of a binding stream.
#[derive(Clone, Debug, PartialEq)]
pub struct Metadata {
    pub cardinality: Cardinality,
    /// The variables that may be bound, in first-seen order.
    pub variables: Vec<Variable>,
    /// Whether a binding may omit a value for one of the `variables`.
    pub can_contain_undefs: bool,
    pub page_size: Option<usize>,
    /// The time until the first binding arrives.
    pub request_initial_time: Option<f64>,
    /// The time between two consecutive bindings.
    pub request_item_time: Option<f64>,
}

impl Metadata {
    /// Creates a new [Metadata] for a stream that binds all of its `variables`.
    pub fn new(cardinality: Cardinality, variables: Vec<Variable>) -> Self {
        Self {
            cardinality,
            variables,
            can_contain_undefs: false,
            page_size: None,
            request_initial_time: None,
            request_item_time: None,
        }
    }

    #[must_use]
    pub fn with_undefs(mut self, can_contain_undefs: bool) -> Self {
        self.can_contain_undefs = can_contain_undefs;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub fn with_request_times(mut self, initial_time: f64, item_time: f64) -> Self {
        self.request_initial_time = Some(initial_time);
        self.request_item_time = Some(item_time);
        self
    }

    /// Returns the initial request time, treating an unknown time as zero.
    pub fn initial_time(&self) -> f64 {
        self.request_initial_time.unwrap_or(0.0)
    }

    /// Returns the per-item request time, treating an unknown time as zero.
    pub fn item_time(&self) -> f64 {
        self.request_item_time.unwrap_or(0.0)
    }

    /// Combines the metadata of the inputs of a join.
    ///
    /// - The cardinality is the product of all cardinalities. It is only exact if all inputs are
    ///   exact.
    /// - The variables are the union of all variables in first-seen order.
    /// - The result can contain undefined values if any input can.
    ///
    /// Request times and page sizes describe a single source and are not carried over.
    pub fn merge<'a>(metadatas: impl IntoIterator<Item = &'a Metadata>) -> Metadata {
        let mut kind = CardinalityKind::Exact;
        let mut value = 1.0;
        let mut variables = Vec::new();
        let mut can_contain_undefs = false;

        for metadata in metadatas {
            if !metadata.cardinality.is_exact() {
                kind = CardinalityKind::Estimate;
            }
            value *= metadata.cardinality.value;
            variables.extend(metadata.variables.iter().cloned());
            can_contain_undefs |= metadata.can_contain_undefs;
        }

        Metadata::new(
            Cardinality { kind, value },
            variables.into_iter().unique().collect(),
        )
        .with_undefs(can_contain_undefs)
    }
}

type SharedMetadataFuture = Shared<BoxFuture<'static, JoinResult<Arc<Metadata>>>>;

/// Provides the [Metadata] of a binding stream.
///
/// The metadata is computed at most once, on the first call of [Self::resolve]. All later calls
/// (also concurrent ones) obtain the same [Arc]. Resolving the metadata never reads from the
/// binding stream.
#[derive(Clone)]
pub struct MetadataAccessor {
    future: SharedMetadataFuture,
}

impl MetadataAccessor {
    /// Creates a new [MetadataAccessor] that lazily resolves `future`.
    pub fn new(future: impl Future<Output = JoinResult<Metadata>> + Send + 'static) -> Self {
        Self {
            future: future.map(|result| result.map(Arc::new)).boxed().shared(),
        }
    }

    /// Creates a [MetadataAccessor] for already known metadata.
    pub fn ready(metadata: Metadata) -> Self {
        Self::new(futures::future::ready(Ok(metadata)))
    }

    /// Resolves the metadata.
    pub async fn resolve(&self) -> JoinResult<Arc<Metadata>> {
        self.future.clone().await
    }

    /// Returns the metadata if it has already been resolved.
    pub fn peek(&self) -> Option<JoinResult<Arc<Metadata>>> {
        self.future.peek().cloned()
    }
}

impl Debug for MetadataAccessor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataAccessor")
            .field("resolved", &self.peek())
            .finish()
    }
}
