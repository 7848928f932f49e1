//! Assertion functions for gathered DIA results.

use std::fmt::Debug;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// # Example
///
/// ```
/// use irondia::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}"
        );
    }
}

/// Assert that two float sequences agree element-wise within `tolerance`.
///
/// Sums of partial values meet in an order that depends on the worker count,
/// so float results are compared with a tolerance.
///
/// # Panics
///
/// Panics if the lengths differ or any pair is further apart than
/// `tolerance`.
///
/// ```
/// use irondia::testing::assert_approx_eq;
///
/// assert_approx_eq(&[0.1 + 0.2, 1.0], &[0.3, 1.0], 1e-12);
/// ```
pub fn assert_approx_eq(actual: &[f64], expected: &[f64], tolerance: f64) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "Value mismatch at index {i}: expected {e}, got {a} (tolerance {tolerance})"
        );
    }
}

/// Split `"<index>: <value>"` lines into their parts.
///
/// # Panics
///
/// Panics on a line that does not have that shape.
///
/// ```
/// use irondia::testing::parse_index_lines;
///
/// let parsed = parse_index_lines(&["0: 0.5".to_string(), "1: 1.25".to_string()]);
/// assert_eq!(parsed, vec![(0, 0.5), (1, 1.25)]);
/// ```
pub fn parse_index_lines(lines: &[String]) -> Vec<(usize, f64)> {
    lines
        .iter()
        .map(|line| {
            let (index, value) = line
                .split_once(": ")
                .unwrap_or_else(|| panic!("not an index line: {line:?}"));
            (
                index.parse().unwrap_or_else(|_| panic!("bad index in {line:?}")),
                value.parse().unwrap_or_else(|_| panic!("bad value in {line:?}")),
            )
        })
        .collect()
}
