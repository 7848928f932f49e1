use irondia::testing::*;
use irondia::{GroupIter, NodeKind, from_vec, generate};

#[test]
fn steps_come_in_dependency_order() {
    let ctx = TestContext::new();
    let src = from_vec(&ctx, vec![1u32, 2, 3]);
    let out = src
        .map(|x: &u32| *x as usize)
        .filter(|x: &usize| *x > 1)
        .group_by_index(|x: &usize| *x, |g: &mut GroupIter<'_, usize>, _| g.count(), 4);

    let explained = out.explain();
    let kinds: Vec<NodeKind> = explained.steps.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![NodeKind::Source, NodeKind::Map, NodeKind::Filter, NodeKind::GroupByIndex]
    );
    assert_eq!(explained.barriers(), 1);
    assert_eq!(explained.steps[3].declared_size, Some(4));
    assert!(explained.steps[2].fused_with_parent);
    assert!(!explained.steps[1].fused_with_parent);
    // Source, the fused map/filter pass, and the grouping.
    assert_eq!(explained.stages(), 3);
}

#[test]
fn shared_ancestors_appear_once() {
    let ctx = TestContext::new();
    let base = generate(&ctx, 5, |i| i);
    let left = base.map(|x: &usize| x + 1);
    let right = base.map(|x: &usize| x * 2);
    let zipped = left.zip(&right, |a: &usize, b: &usize| a + b);

    let explained = zipped.explain();
    assert_eq!(explained.steps.len(), 4);
    assert_eq!(explained.steps[0].kind, NodeKind::Generate);
    assert_eq!(explained.steps[0].declared_size, Some(5));
    assert_eq!(explained.steps[3].parents.len(), 2);
}

#[test]
fn retained_nodes_hide_their_ancestors() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let cached = generate(&ctx, 5, |i| i).map(|x: &usize| x + 1).cache();
    assert_eq!(cached.explain().steps.len(), 3);

    cached.size()?;
    let explained = cached.map(|x: &usize| x * 2).explain();
    assert_eq!(explained.steps.len(), 2);
    assert!(explained.steps[0].retained);
    assert!(!explained.steps[1].fused_with_parent);
    Ok(())
}

#[test]
fn display_lists_every_node() {
    let ctx = TestContext::new();
    let out = generate(&ctx, 3, |i| i as u64).map(|x: &u64| x + 1).collapse();
    let text = out.explain().to_string();
    assert!(text.contains("DIA GRAPH"));
    assert!(text.contains("Generate#"));
    assert!(text.contains("Map#"));
    assert!(text.contains("Collapse#"));
    assert!(text.contains("size: 3"));
    assert!(text.contains("u64"));
}
