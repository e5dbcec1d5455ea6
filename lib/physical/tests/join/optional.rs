use crate::test_utils::{
    binding, collect_sorted, execute_strategy, graph_entries, vars, TestEntry,
};
use rdf_federation_common::{Cardinality, JoinResult, LogicalJoinType};
use rdf_federation_physical::join::{
    BindOrder, JoinEntry, OptionalBindJoin, OptionalNestedLoopJoin, PhysicalJoin,
    DEFAULT_BIND_JOIN_BUFFER_SIZE,
};

fn entries() -> Vec<JoinEntry> {
    let (left, _) =
        TestEntry::new(&["a"], vec![binding(&[("a", "1")]), binding(&[("a", "2")])]).build();
    let (right, _) =
        TestEntry::new(&["a", "b"], vec![binding(&[("a", "1"), ("b", "9")])]).build();
    vec![left, right]
}

#[tokio::test]
async fn optional_joins_keep_unmatched_left_bindings() -> JoinResult<()> {
    let output = execute_strategy(
        &OptionalNestedLoopJoin,
        LogicalJoinType::Optional,
        entries(),
    )
    .await?;
    let expected = collect_sorted(output).await?;
    insta::assert_snapshot!(expected, @r#"
    {?a: "1", ?b: "9"}
    {?a: "2"}
    "#);

    let strategies: [&dyn PhysicalJoin; 2] = [
        &OptionalBindJoin::new(BindOrder::DepthFirst, DEFAULT_BIND_JOIN_BUFFER_SIZE),
        &OptionalBindJoin::new(BindOrder::BreadthFirst, 4),
    ];
    for strategy in strategies {
        let output = execute_strategy(strategy, LogicalJoinType::Optional, entries()).await?;
        assert_eq!(collect_sorted(output).await?, expected, "{}", strategy.name());
    }
    Ok(())
}

#[tokio::test]
async fn optional_joins_keep_left_bindings_without_compatible_matches() -> JoinResult<()> {
    let output = execute_strategy(
        &OptionalNestedLoopJoin,
        LogicalJoinType::Optional,
        graph_entries(),
    )
    .await?;
    let expected = collect_sorted(output).await?;
    insta::assert_snapshot!(expected, @r#"
    {?b: "1", ?g: <http://example.com/graph>}
    {?g: "x"}
    "#);

    let strategies: [&dyn PhysicalJoin; 2] = [
        &OptionalBindJoin::new(BindOrder::DepthFirst, DEFAULT_BIND_JOIN_BUFFER_SIZE),
        &OptionalBindJoin::new(BindOrder::BreadthFirst, 4),
    ];
    for strategy in strategies {
        let output =
            execute_strategy(strategy, LogicalJoinType::Optional, graph_entries()).await?;
        assert_eq!(collect_sorted(output).await?, expected, "{}", strategy.name());
    }
    Ok(())
}

#[tokio::test]
async fn optional_join_emits_left_binding_once() -> JoinResult<()> {
    let (left, _) =
        TestEntry::new(&["a"], vec![binding(&[("a", "1")]), binding(&[("a", "2")])]).build();
    let (right, _) = TestEntry::new(
        &["a", "b"],
        vec![
            binding(&[("a", "1"), ("b", "8")]),
            binding(&[("a", "1"), ("b", "9")]),
            binding(&[("a", "3"), ("b", "7")]),
        ],
    )
    .build();

    let output = execute_strategy(
        &OptionalNestedLoopJoin,
        LogicalJoinType::Optional,
        vec![left, right],
    )
    .await?;

    insta::assert_snapshot!(collect_sorted(output).await?, @r#"
    {?a: "1", ?b: "8"}
    {?a: "1", ?b: "9"}
    {?a: "2"}
    "#);
    Ok(())
}

#[tokio::test]
async fn optional_join_metadata() -> JoinResult<()> {
    let (left, _) = TestEntry::new(&["a"], vec![binding(&[("a", "1")]), binding(&[("a", "2")])])
        .with_cardinality(Cardinality::exact(5.0))
        .build();
    let (right, _) = TestEntry::new(&["a", "b"], Vec::new())
        .with_cardinality(Cardinality::estimate(0.5))
        .build();

    let output = execute_strategy(
        &OptionalNestedLoopJoin,
        LogicalJoinType::Optional,
        vec![left, right],
    )
    .await?;
    let metadata = output.metadata.resolve().await?;

    assert!(metadata.can_contain_undefs);
    assert_eq!(metadata.cardinality, Cardinality::estimate(5.0));
    assert_eq!(metadata.variables, vars(&["a", "b"]));
    Ok(())
}

#[tokio::test]
async fn optional_bind_join_rejects_disjoint_entries() {
    let (left, _) = TestEntry::new(&["a"], vec![binding(&[("a", "1")])]).build();
    let (right, _) = TestEntry::new(&["b"], vec![binding(&[("b", "1")])]).build();

    let result = execute_strategy(
        &OptionalBindJoin::new(BindOrder::DepthFirst, DEFAULT_BIND_JOIN_BUFFER_SIZE),
        LogicalJoinType::Optional,
        vec![left, right],
    )
    .await;

    insta::assert_snapshot!(
        result.err().map(|e| e.to_string()).unwrap_or_default(),
        @"An internal error that likely indicates towards a bug in RDF Federation: optional-bind requires a variable that is shared by at least two entries"
    );
}
