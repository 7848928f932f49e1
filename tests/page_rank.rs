use irondia::page_rank::{DAMPENING, page_rank};
use irondia::testing::*;
use irondia::{DiaError, dia_error, from_vec, read_lines};

#[test]
fn three_cycle_one_iteration() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let links = from_vec(&ctx, cycle_links(3));
    let out = page_rank(&links, 1)?.all_gather()?;
    assert_collections_equal(
        &out,
        &["0: 0.900000", "1: 0.900000", "2: 0.900000"].map(String::from),
    );
    Ok(())
}

#[test]
fn zero_iterations_keep_the_initial_ranks() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let links = from_vec(&ctx, cycle_links(5));
    let out = page_rank(&links, 0)?.all_gather()?;
    let expected: Vec<String> = (0..5).map(|i| format!("{i}: 1.000000")).collect();
    assert_collections_equal(&out, &expected);
    Ok(())
}

#[test]
fn ranks_converge_on_a_cycle() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let links = from_vec(&ctx, cycle_links(4));
    let ranks: Vec<f64> = parse_index_lines(&page_rank(&links, 30)?.all_gather()?)
        .into_iter()
        .map(|(_, r)| r)
        .collect();
    // The fixpoint of r = d*r + (1-d)/N on a cycle is 1/N.
    let fixpoint = 1.0 / 4.0;
    assert_approx_eq(&ranks, &[fixpoint; 4], 1e-2);
    Ok(())
}

#[test]
fn results_agree_across_worker_counts() -> anyhow::Result<()> {
    let lines = star_links(9);
    let mut runs = Vec::new();
    for workers in [1, 2, 3, 4, 7] {
        let ctx = TestContext::with_workers(workers);
        let out = page_rank(&from_vec(&ctx, lines.clone()), 5)?.all_gather()?;
        let parsed = parse_index_lines(&out);
        let ids: Vec<usize> = parsed.iter().map(|p| p.0).collect();
        assert_collections_equal(&ids, &(0..9).collect::<Vec<_>>());
        runs.push(parsed.into_iter().map(|p| p.1).collect::<Vec<f64>>());
    }
    for run in &runs[1..] {
        // Printed with six decimals, so allow one unit in the last place.
        assert_approx_eq(run, &runs[0], 2e-6);
    }
    Ok(())
}

#[test]
fn pages_without_inbound_links_keep_the_teleport_share() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    // Page 2 only links out; page 3 is isolated except as a target of 2.
    let links = from_vec(&ctx, vec!["0\t1".to_string(), "1\t0".to_string(), "2\t3".to_string()]);
    let parsed = parse_index_lines(&page_rank(&links, 1)?.all_gather()?);
    let teleport = (1.0 - DAMPENING) / 4.0;
    assert_approx_eq(
        &parsed.iter().map(|p| p.1).collect::<Vec<_>>(),
        &[
            DAMPENING + teleport,
            DAMPENING + teleport,
            teleport,
            DAMPENING + teleport,
        ],
        1e-6,
    );
    Ok(())
}

#[test]
fn malformed_line_is_a_parse_error() {
    let ctx = TestContext::new();
    let links = from_vec(&ctx, vec!["0\t1".to_string(), "1 2".to_string()]);
    let err = page_rank(&links, 1).unwrap_err();
    match dia_error(&err) {
        Some(DiaError::Parse { line, .. }) => assert_eq!(line, "1 2"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn empty_input_has_no_pages() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let links = from_vec(&ctx, Vec::<String>::new());
    assert_eq!(page_rank(&links, 3)?.size()?, 0);
    Ok(())
}

#[test]
fn reads_links_from_a_file() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let file = temp_lines_file(&cycle_links(3));
    let links = read_lines(&ctx, file.path())?;
    assert_eq!(links.size()?, 3);

    let out = page_rank(&links, 1)?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ranks.txt");
    out.write_lines(&path)?;
    let written = std::fs::read_to_string(&path)?;
    assert_eq!(written, "0: 0.900000\n1: 0.900000\n2: 0.900000\n");
    Ok(())
}

#[test]
fn largest_page_id_is_rejected() {
    let ctx = TestContext::new();
    let links = from_vec(&ctx, vec![format!("{}\t0", usize::MAX)]);
    let err = page_rank(&links, 1).unwrap_err();
    assert!(matches!(dia_error(&err), Some(DiaError::Usage(_))), "{err:#}");
}
