//! Streaming implementations of the non-join operators of the algebra.

use futures::{StreamExt, TryStreamExt};
use itertools::Itertools;
use rdf_federation_common::{
    BindingStreamOutput, Cardinality, CardinalityKind, Metadata, MetadataAccessor,
};
use rdf_federation_model::{Binding, GroundTerm, Term, Variable};
use rustc_hash::FxHashSet;
use std::future::ready;

/// Concatenates the bindings of `left` and `right`.
///
/// The result can contain undefined values if the inputs bind different variables.
pub fn union(left: BindingStreamOutput, right: BindingStreamOutput) -> BindingStreamOutput {
    let left_metadata = left.metadata;
    let right_metadata = right.metadata;
    let metadata = MetadataAccessor::new(async move {
        let (left, right) =
            futures::try_join!(left_metadata.resolve(), right_metadata.resolve())?;

        let kind = if left.cardinality.is_exact() && right.cardinality.is_exact() {
            CardinalityKind::Exact
        } else {
            CardinalityKind::Estimate
        };
        let variables = left
            .variables
            .iter()
            .chain(&right.variables)
            .unique()
            .cloned()
            .collect::<Vec<_>>();
        let can_contain_undefs = left.can_contain_undefs
            || right.can_contain_undefs
            || variables.len() != left.variables.len()
            || variables.len() != right.variables.len();

        Ok(Metadata::new(
            Cardinality {
                kind,
                value: left.cardinality.value + right.cardinality.value,
            },
            variables,
        )
        .with_undefs(can_contain_undefs))
    });

    BindingStreamOutput::new(left.bindings.chain(right.bindings).boxed(), metadata)
}

/// Restricts every binding of `inner` to `variables`.
pub fn project(inner: BindingStreamOutput, variables: Vec<Variable>) -> BindingStreamOutput {
    let inner_metadata = inner.metadata;
    let projected = variables.clone();
    let metadata = MetadataAccessor::new(async move {
        let inner = inner_metadata.resolve().await?;
        let can_contain_undefs = inner.can_contain_undefs
            || projected.iter().any(|v| !inner.variables.contains(v));
        Ok(Metadata::new(inner.cardinality, projected).with_undefs(can_contain_undefs))
    });

    let bindings = inner
        .bindings
        .map_ok(move |binding| binding.project(&variables))
        .boxed();
    BindingStreamOutput::new(bindings, metadata)
}

/// Removes duplicate bindings from `inner`.
///
/// The number of duplicates is unknown upfront, so the cardinality of the input becomes an
/// estimate.
pub fn distinct(inner: BindingStreamOutput) -> BindingStreamOutput {
    let inner_metadata = inner.metadata;
    let metadata = MetadataAccessor::new(async move {
        let inner = inner_metadata.resolve().await?;
        let mut result = inner.as_ref().clone();
        if !inner.cardinality.is_exactly_empty() {
            result.cardinality = Cardinality::estimate(inner.cardinality.value);
        }
        Ok(result)
    });

    let mut seen = FxHashSet::default();
    let bindings = inner
        .bindings
        .try_filter(move |binding| ready(seen.insert(binding.clone())))
        .boxed();
    BindingStreamOutput::new(bindings, metadata)
}

/// Materializes the rows of a `VALUES` clause.
pub fn values(variables: &[Variable], rows: &[Vec<Option<GroundTerm>>]) -> BindingStreamOutput {
    let bindings = rows
        .iter()
        .map(|row| {
            variables
                .iter()
                .zip(row)
                .filter_map(|(variable, value)| {
                    value
                        .as_ref()
                        .and_then(ground_term)
                        .map(|term| (variable.clone(), term))
                })
                .collect::<Binding>()
        })
        .collect::<Vec<_>>();
    let can_contain_undefs = bindings.iter().any(|b| b.len() < variables.len());

    #[allow(
        clippy::cast_precision_loss,
        reason = "Cardinalities are approximate for huge inputs"
    )]
    let cardinality = Cardinality::exact(bindings.len() as f64);
    BindingStreamOutput::from_bindings(
        bindings,
        Metadata::new(cardinality, variables.to_vec()).with_undefs(can_contain_undefs),
    )
}

fn ground_term(term: &GroundTerm) -> Option<Term> {
    match term {
        GroundTerm::NamedNode(node) => Some(node.clone().into()),
        GroundTerm::Literal(literal) => Some(literal.clone().into()),
        #[allow(unreachable_patterns, reason = "Depends on the enabled spargebra features")]
        _ => None,
    }
}
