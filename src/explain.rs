//! Human-readable description of a DIA's lazy graph.
//!
//! [`Dia::explain`](crate::Dia::explain) walks the ancestors of a handle and
//! lists them in dependency order (parents before children), each node once,
//! together with what the runner will do with it: whether the node already
//! holds a retained result, whether it exchanges records between workers, and
//! whether it is fused into its parent's pass.

use crate::node::{DiaNode, NodeKind, NodeOp};
use crate::node_id::NodeId;
use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::Arc;

/// One node of an explained graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainStep {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Element type name.
    pub elem: &'static str,
    /// Index-space size for Generate, ReduceToIndex and GroupByIndex.
    pub declared_size: Option<usize>,
    /// The node holds its result; nothing above it runs again.
    pub retained: bool,
    /// The node redistributes records between workers.
    pub is_barrier: bool,
    /// The node runs in the same pass as its stateless parent.
    pub fused_with_parent: bool,
    pub parents: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct GraphExplanation {
    pub steps: Vec<ExplainStep>,
}

impl GraphExplanation {
    pub(crate) fn of(root: &Arc<DiaNode>) -> Self {
        let mut steps = Vec::new();
        let mut seen = HashSet::new();
        visit(root, &mut seen, &mut steps);
        Self { steps }
    }

    /// Number of exchanges a full recomputation would perform.
    pub fn barriers(&self) -> usize {
        self.steps.iter().filter(|s| s.is_barrier && !s.retained).count()
    }

    /// Number of passes over data the runner would start, counting fused
    /// chains once.
    pub fn stages(&self) -> usize {
        self.steps.iter().filter(|s| !s.fused_with_parent).count()
    }
}

fn visit(node: &Arc<DiaNode>, seen: &mut HashSet<NodeId>, steps: &mut Vec<ExplainStep>) {
    if !seen.insert(node.id) {
        return;
    }
    let retained = node.is_retained();
    // A retained node's ancestors never run again.
    if !retained {
        for parent in &node.parents {
            visit(parent, seen, steps);
        }
    }
    let fused_with_parent = !retained
        && matches!(node.op, NodeOp::Stateless(_))
        && node
            .parents
            .first()
            .is_some_and(|p| matches!(p.op, NodeOp::Stateless(_)) && !p.is_retained());
    steps.push(ExplainStep {
        id: node.id,
        kind: node.kind,
        elem: node.elem.name,
        declared_size: node.declared_size(),
        retained,
        is_barrier: node.kind.is_barrier(),
        fused_with_parent,
        parents: node.parents.iter().map(|p| p.id).collect(),
    });
}

impl Display for GraphExplanation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        writeln!(
            f,
            "┌─ DIA GRAPH ──────────────────────────────────────────────────┐"
        )?;
        writeln!(f, "│ Nodes:    {:>6}", self.steps.len())?;
        writeln!(f, "│ Stages:   {:>6}", self.stages())?;
        writeln!(f, "│ Barriers: {:>6}", self.barriers())?;
        for step in &self.steps {
            let mut markers = String::new();
            if step.retained {
                markers.push_str(" [RETAINED]");
            }
            if step.is_barrier {
                markers.push_str(" [BARRIER]");
            }
            if step.fused_with_parent {
                markers.push_str(" [FUSED]");
            }
            writeln!(f, "│")?;
            writeln!(f, "│ {}{}: {}{markers}", step.kind, step.id, step.elem)?;
            if let Some(n) = step.declared_size {
                writeln!(f, "│   size: {n}")?;
            }
            if !step.parents.is_empty() {
                let parents: Vec<String> = step.parents.iter().map(ToString::to_string).collect();
                writeln!(f, "│   from: {}", parents.join(", "))?;
            }
        }
        writeln!(f, "│")?;
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )
    }
}
