use crate::test_utils::{binding, create_context, execute_strategy, EntryProbe, TestEntry};
use futures::StreamExt;
use rdf_federation_common::error::JoinError;
use rdf_federation_common::{BindingStreamOutput, Cardinality, JoinResult, LogicalJoinType};
use rdf_federation_physical::join::{
    BindJoin, BindOrder, JoinAction, JoinEntry, JoinMediator, NestedLoopJoin,
    OptionalNestedLoopJoin, PhysicalJoin, SymmetricHashJoin, DEFAULT_BIND_JOIN_BUFFER_SIZE,
};
use std::sync::Arc;

fn probed_entries() -> (Vec<JoinEntry>, Vec<EntryProbe>) {
    let (left, left_probe) = TestEntry::new(
        &["a", "b"],
        vec![
            binding(&[("a", "1"), ("b", "2")]),
            binding(&[("a", "1"), ("b", "3")]),
            binding(&[("a", "2"), ("b", "4")]),
        ],
    )
    .build();
    let (right, right_probe) = TestEntry::new(
        &["a", "c"],
        vec![
            binding(&[("a", "1"), ("c", "4")]),
            binding(&[("a", "2"), ("c", "5")]),
        ],
    )
    .build();
    (vec![left, right], vec![left_probe, right_probe])
}

fn binary_strategies() -> Vec<Box<dyn PhysicalJoin>> {
    vec![
        Box::new(NestedLoopJoin),
        Box::new(SymmetricHashJoin),
        Box::new(BindJoin::binary(BindOrder::DepthFirst, DEFAULT_BIND_JOIN_BUFFER_SIZE)),
        Box::new(BindJoin::binary(BindOrder::BreadthFirst, 2)),
    ]
}

#[tokio::test]
async fn metadata_is_memoized() -> JoinResult<()> {
    let (entries, probes) = probed_entries();

    let first = entries[0].output.metadata.resolve().await?;
    let second = entries[0].output.metadata.clone().resolve().await?;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(probes[0].metadata_resolutions(), 1);
    assert_eq!(probes[0].polls(), 0);
    Ok(())
}

#[tokio::test]
async fn strategy_selection_does_not_read_streams() -> JoinResult<()> {
    let mediator = Arc::new(JoinMediator::default());
    let (context, _) = create_context(&mediator);
    let (entries, probes) = probed_entries();

    let output = mediator
        .join(JoinAction::new(LogicalJoinType::Inner, entries, context))
        .await?;

    for probe in &probes {
        assert_eq!(probe.metadata_resolutions(), 1);
        assert_eq!(probe.polls(), 0);
    }
    drop(output);
    Ok(())
}

#[tokio::test]
async fn closing_the_result_closes_all_entries() -> JoinResult<()> {
    for strategy in binary_strategies() {
        let (entries, probes) = probed_entries();

        let mut output =
            execute_strategy(strategy.as_ref(), LogicalJoinType::Inner, entries).await?;
        let first = output.bindings.next().await;
        assert!(matches!(first, Some(Ok(_))), "{}", strategy.name());
        drop(output);

        for probe in &probes {
            assert!(probe.is_closed(), "{}", strategy.name());
        }
    }
    Ok(())
}

#[tokio::test]
async fn closing_an_optional_join_closes_all_entries() -> JoinResult<()> {
    let (entries, probes) = probed_entries();

    let mut output =
        execute_strategy(&OptionalNestedLoopJoin, LogicalJoinType::Optional, entries).await?;
    assert!(matches!(output.bindings.next().await, Some(Ok(_))));
    drop(output);

    assert!(probes.iter().all(EntryProbe::is_closed));
    Ok(())
}

#[tokio::test]
async fn closing_a_decomposed_join_closes_all_entries() -> JoinResult<()> {
    let mediator = Arc::new(JoinMediator::default());
    let (context, _) = create_context(&mediator);
    let (mut entries, mut probes) = probed_entries();
    let (third, third_probe) = TestEntry::new(
        &["c", "d"],
        vec![binding(&[("c", "4"), ("d", "6")]), binding(&[("c", "5"), ("d", "7")])],
    )
    .build();
    entries.push(third);
    probes.push(third_probe);

    let mut output = mediator
        .join(JoinAction::new(LogicalJoinType::Inner, entries, context))
        .await?;
    assert!(matches!(output.bindings.next().await, Some(Ok(_))));
    drop(output);

    assert!(probes.iter().all(EntryProbe::is_closed));
    Ok(())
}

async fn read_until_error(output: BindingStreamOutput) -> Option<JoinError> {
    let mut bindings = output.bindings;
    while let Some(item) = bindings.next().await {
        if let Err(error) = item {
            assert!(bindings.next().await.is_none(), "Stream continued after an error");
            return Some(error);
        }
    }
    None
}

#[tokio::test]
async fn entry_errors_terminate_the_join() -> JoinResult<()> {
    for strategy in binary_strategies() {
        for failing in [0, 1] {
            let (healthy, healthy_probe) = TestEntry::new(
                &["a", "b"],
                vec![
                    binding(&[("a", "1"), ("b", "2")]),
                    binding(&[("a", "1"), ("b", "3")]),
                    binding(&[("a", "2"), ("b", "4")]),
                ],
            )
            .build();
            // The failing entry is the smallest one, so bind joins use it as the driver.
            let (failing_entry, failing_probe) = TestEntry::new(
                &["a", "c"],
                vec![
                    binding(&[("a", "1"), ("c", "4")]),
                    binding(&[("a", "2"), ("c", "5")]),
                ],
            )
            .failing_after(1)
            .build();
            let entries = if failing == 0 {
                vec![failing_entry, healthy]
            } else {
                vec![healthy, failing_entry]
            };

            let output =
                execute_strategy(strategy.as_ref(), LogicalJoinType::Inner, entries).await?;
            let error = read_until_error(output).await;

            assert_eq!(
                error.map(|e| e.to_string()),
                Some(String::from("The source failed.")),
                "{} failing entry {failing}",
                strategy.name()
            );
            assert!(failing_probe.is_closed());
            assert!(healthy_probe.is_closed());
        }
    }
    Ok(())
}

#[tokio::test]
async fn empty_entry_skips_the_join() -> JoinResult<()> {
    let mediator = Arc::new(JoinMediator::default());
    let (context, _) = create_context(&mediator);
    let (empty, empty_probe) = TestEntry::new(&["a"], Vec::new()).build();
    let (other, other_probe) = TestEntry::new(&["a", "b"], vec![binding(&[("a", "1")])])
        .with_cardinality(Cardinality::estimate(100.0))
        .build();

    let mut output = mediator
        .join(JoinAction::new(
            LogicalJoinType::Inner,
            vec![other, empty],
            context,
        ))
        .await?;

    assert_eq!(
        output.metadata.resolve().await?.cardinality,
        Cardinality::exact(0.0)
    );
    assert!(output.bindings.next().await.is_none());
    assert_eq!(other_probe.polls(), 0);
    assert!(other_probe.is_closed());
    assert!(empty_probe.is_closed());
    Ok(())
}
