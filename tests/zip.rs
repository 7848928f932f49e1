use irondia::testing::*;
use irondia::{Context, ContextConfig, DiaError, dia_error, from_vec, generate};

#[test]
fn zip_pairs_equal_positions() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let letters = from_vec(&ctx, "abcdefg".chars().collect::<Vec<_>>());
    let ids = generate(&ctx, 7, |i| i);
    let out = ids
        .zip(&letters, |i: &usize, c: &char| format!("{i}{c}"))
        .all_gather()?;
    assert_collections_equal(
        &out,
        &["0a", "1b", "2c", "3d", "4e", "5f", "6g"].map(String::from),
    );
    Ok(())
}

#[test]
fn zip_realigns_differently_partitioned_operands() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    // The filter leaves the left operand unevenly spread over the workers.
    let left = from_vec(&ctx, (0..40u32).collect::<Vec<_>>()).filter(|x: &u32| *x >= 25);
    let right = generate(&ctx, 15, |i| i as u32 * 100);
    let out = left.zip(&right, |a: &u32, b: &u32| (*a, *b)).all_gather()?;
    let expected: Vec<(u32, u32)> = (0..15u32).map(|i| (25 + i, i * 100)).collect();
    assert_collections_equal(&out, &expected);
    Ok(())
}

#[test]
fn zip_length_mismatch_is_a_usage_error() {
    let ctx = TestContext::new();
    let a = generate(&ctx, 5, |i| i);
    let b = generate(&ctx, 6, |i| i);
    let zipped = a.zip(&b, |x: &usize, y: &usize| x + y);
    let err = zipped.size().unwrap_err();
    assert!(matches!(dia_error(&err), Some(DiaError::Usage(_))), "{err:#}");
}

#[test]
fn zip_across_contexts_is_a_usage_error() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let other = Context::new(ContextConfig::default().with_workers(3).with_threads(1))?;
    let a = generate(&ctx, 3, |i| i);
    let b = generate(&other, 3, |i| i);
    let err = a.zip(&b, |x: &usize, y: &usize| x + y).all_gather().unwrap_err();
    assert!(matches!(dia_error(&err), Some(DiaError::Usage(_))), "{err:#}");
    Ok(())
}

#[test]
fn zip_of_empty_operands_is_empty() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let a = generate(&ctx, 0, |i| i);
    let b = from_vec(&ctx, Vec::<String>::new());
    assert_eq!(a.zip(&b, |i: &usize, s: &String| format!("{i}{s}")).size()?, 0);
    Ok(())
}
