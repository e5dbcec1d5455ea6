use crate::join::{
    JoinAction, JoinCoefficients, JoinEntry, JoinMediator, JoinProperties, PhysicalJoin,
};
use async_trait::async_trait;
use rdf_federation_common::error::JoinError;
use rdf_federation_common::{
    BindingStreamOutput, Cardinality, JoinResult, LogicalJoinType, Metadata,
};
use rdf_federation_model::Binding;
use std::sync::Arc;

/// Joins zero entries, which results in a single empty binding.
#[derive(Debug, Default)]
pub struct NoneJoin;

#[async_trait]
impl PhysicalJoin for NoneJoin {
    fn properties(&self) -> JoinProperties {
        JoinProperties {
            name: "none",
            join_type: LogicalJoinType::Inner,
            min_entries: 0,
            max_entries: Some(0),
            can_handle_undefs: true,
        }
    }

    fn estimate(&self, _entries: &[JoinEntry], _metadatas: &[Arc<Metadata>]) -> JoinCoefficients {
        JoinCoefficients::default()
    }

    async fn execute(
        &self,
        _action: JoinAction,
        _metadatas: Vec<Arc<Metadata>>,
        _mediator: &JoinMediator,
    ) -> JoinResult<BindingStreamOutput> {
        Ok(BindingStreamOutput::from_bindings(
            vec![Binding::empty()],
            Metadata::new(Cardinality::exact(1.0), Vec::new()),
        ))
    }
}

/// Joins a single entry, which is the entry itself.
#[derive(Debug, Default)]
pub struct SingleJoin;

#[async_trait]
impl PhysicalJoin for SingleJoin {
    fn properties(&self) -> JoinProperties {
        JoinProperties {
            name: "single",
            join_type: LogicalJoinType::Inner,
            min_entries: 1,
            max_entries: Some(1),
            can_handle_undefs: true,
        }
    }

    fn estimate(&self, _entries: &[JoinEntry], _metadatas: &[Arc<Metadata>]) -> JoinCoefficients {
        JoinCoefficients::default()
    }

    async fn execute(
        &self,
        action: JoinAction,
        _metadatas: Vec<Arc<Metadata>>,
        _mediator: &JoinMediator,
    ) -> JoinResult<BindingStreamOutput> {
        let Some(entry) = action.entries.into_iter().next() else {
            return JoinError::internal("Single join executed without an entry.");
        };
        Ok(entry.output)
    }
}
