use irondia::testing::*;
use irondia::{MetricsSnapshot, from_vec, generate};

#[test]
fn fresh_context_has_zero_counters() {
    let ctx = TestContext::new();
    assert_eq!(ctx.metrics().snapshot(), MetricsSnapshot::default());
}

#[test]
fn triggers_and_materializations_are_counted() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let nums = from_vec(&ctx, vec![1u32, 2, 3, 4]);

    nums.map(|x: &u32| x + 1).filter(|x: &u32| x % 2 == 0).size()?;
    let snap = ctx.metrics().snapshot();
    assert_eq!(snap.triggers, 1);
    // Source plus one fused pass.
    assert_eq!(snap.nodes_materialized, 2);
    assert_eq!(snap.records_exchanged, 0);

    nums.all_gather()?;
    assert_eq!(ctx.metrics().snapshot().triggers, 2);
    Ok(())
}

#[test]
fn metrics_serialize_to_json() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let cached = generate(&ctx, 10, |i| (i % 5, 1u64)).cache();
    cached
        .reduce_to_index(|p: &(usize, u64)| p.0, |a, b| (a.0, a.1 + b.1), 5)
        .size()?;
    cached.size()?;

    let json = ctx.metrics().to_json();
    assert_eq!(json["triggers"], 2);
    assert_eq!(json["cache_hits"], 1);
    assert!(json["records_exchanged"].as_u64().unwrap_or(0) > 0);
    assert!(json["bytes_exchanged"].as_u64().unwrap_or(0) > 0);
    Ok(())
}
