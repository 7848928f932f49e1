//! PageRank over a link list, built from the DIA operators.
//!
//! Input lines are `"<src>\t<tgt>"` pairs of page ids. Pages are the dense
//! range `[0, max_id]`; a page without outgoing links contributes nothing
//! and a page without incoming links keeps the teleport share
//! `(1 - DAMPENING) / num_pages`.
//!
//! ```
//! use irondia::*;
//! use irondia::page_rank::page_rank;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = Context::new(ContextConfig::default().with_workers(2))?;
//! let links = from_vec(&ctx, vec!["0\t1".to_string(), "1\t2".to_string(), "2\t0".to_string()]);
//! let ranks = page_rank(&links, 1)?.all_gather()?;
//! assert_eq!(ranks, vec!["0: 0.900000", "1: 0.900000", "2: 0.900000"]);
//! # Ok(())
//! # }
//! ```

use crate::dia::Dia;
use crate::error::DiaError;
use crate::helpers::{GroupIter, generate};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DAMPENING: f64 = 0.85;

pub type PageId = usize;
pub type Rank = f64;

/// A link from page `src` to page `tgt`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePageLink {
    pub src: PageId,
    pub tgt: PageId,
}

/// A rank contribution to `page`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRankPair {
    pub page: PageId,
    pub rank: Rank,
}

/// Parse one `"<src>\t<tgt>"` line.
///
/// # Errors
///
/// [`DiaError::Parse`] if the line is not two unsigned integers separated by
/// a single tab with nothing after the second one.
pub fn parse_link(line: &str) -> Result<PagePageLink, DiaError> {
    let fail = |reason: &str| DiaError::Parse {
        line: line.to_string(),
        reason: reason.to_string(),
    };
    let (src, tgt) = line
        .split_once('\t')
        .ok_or_else(|| fail("expected a tab between source and target"))?;
    let src = parse_id(src).ok_or_else(|| fail("source is not a page id"))?;
    let tgt = parse_id(tgt).ok_or_else(|| fail("target is not a page id"))?;
    Ok(PagePageLink { src, tgt })
}

fn parse_id(s: &str) -> Option<PageId> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Run `iterations` rounds of PageRank over `input_links` and return one
/// `"<page>: <rank>"` line per page, ranks printed with six decimals.
///
/// # Errors
///
/// [`DiaError::Parse`] for a malformed input line, plus any failure of the
/// materializations the computation triggers.
pub fn page_rank(input_links: &Dia<String>, iterations: usize) -> Result<Dia<String>> {
    let ctx = input_links.context().clone();

    let input = input_links.try_map(|line: &String| Ok(parse_link(line)?));

    let num_pages = input
        .map(|l: &PagePageLink| l.src.max(l.tgt))
        .max()?
        .map_or(Some(0), |m| m.checked_add(1))
        .ok_or_else(|| DiaError::usage("page id leaves no room for a page count"))?;
    info!(
        num_pages,
        memory = ctx.memory().total(),
        peak = ctx.memory().peak(),
        "parsed links"
    );

    let links = input
        .group_by_index(
            |l: &PagePageLink| l.src,
            |g: &mut GroupIter<'_, PagePageLink>, _| g.map(|l| l.tgt).collect::<Vec<PageId>>(),
            num_pages,
        )
        .cache();

    let mut ranks: Dia<Rank> = generate(&ctx, num_pages, |_| 1.0).collapse();

    for iter in 0..iterations {
        info!(iter, "iteration");

        let outs_rank = links.zip(&ranks, |ol: &Vec<PageId>, r: &Rank| (ol.clone(), *r));

        let contribs = outs_rank.flat_map(|(ol, r): &(Vec<PageId>, Rank)| {
            let contrib = if ol.is_empty() { 0.0 } else { r / ol.len() as Rank };
            ol.iter()
                .map(|&tgt| PageRankPair {
                    page: tgt,
                    rank: contrib,
                })
                .collect::<Vec<_>>()
        });

        ranks = contribs
            .reduce_to_index(
                |p: &PageRankPair| p.page,
                |a: &PageRankPair, b: &PageRankPair| PageRankPair {
                    page: a.page,
                    rank: a.rank + b.rank,
                },
                num_pages,
            )
            .map(move |p: &PageRankPair| {
                DAMPENING * p.rank + (1.0 - DAMPENING) / num_pages as Rank
            })
            .execute()?
            .collapse();
    }

    let node_ids = generate(&ctx, num_pages, |index| index);
    Ok(ranks.zip(&node_ids, |r: &Rank, p: &PageId| format!("{p}: {r:.6}")))
}
