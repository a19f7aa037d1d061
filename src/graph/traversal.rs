//! Reachability and ordering over the vertex arena.
//!
//! The arena invariant (parents are created before children, so parent
//! indices are strictly smaller) makes ordering cheap: arena index order
//! *is* a topological order, and any vertex subset is topologically sorted
//! by sorting its indices. What remains is reachability:
//!
//! - [`ancestors_inclusive`]: the upstream closure of a seed set over
//!   parent edges, seeds included.
//! - [`connects_to_any`]: the set of vertices from which some target is
//!   reachable over parent edges (equivalently, the downstream closure of
//!   the targets over child edges). Reverse mode intersects this with the
//!   output's ancestor set to prune branches that cannot influence any
//!   wrt vertex.
use std::collections::HashSet;

use crate::graph::vertex::{BayesNet, VertexId};

/// Upstream closure of `seeds` over parent edges, seeds included.
pub fn ancestors_inclusive(net: &BayesNet, seeds: &[VertexId]) -> HashSet<VertexId> {
    let mut seen: HashSet<VertexId> = HashSet::new();
    let mut stack: Vec<VertexId> = seeds.to_vec();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        stack.extend(net.parents(id).iter().copied());
    }
    seen
}

/// Vertices from which at least one target is reachable via parent edges,
/// targets included.
///
/// Built by expanding the targets over child edges; the child adjacency is
/// derived from the arena's parent lists in one scan.
pub fn connects_to_any(net: &BayesNet, targets: &HashSet<VertexId>) -> HashSet<VertexId> {
    let mut children: Vec<Vec<VertexId>> = vec![Vec::new(); net.len()];
    for id in net.vertex_ids() {
        for &p in net.parents(id) {
            children[p.0].push(id);
        }
    }

    let mut seen: HashSet<VertexId> = HashSet::new();
    let mut stack: Vec<VertexId> = targets.iter().copied().collect();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        stack.extend(children[id.0].iter().copied());
    }
    seen
}

/// Sort a vertex set into topological (arena index) order.
pub fn sorted_ascending(set: &HashSet<VertexId>) -> Vec<VertexId> {
    let mut out: Vec<VertexId> = set.iter().copied().collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // Small diamond: d = (a + b) * (a - b), with an unrelated island `e`.
    fn diamond() -> (BayesNet, [VertexId; 5]) {
        let mut net = BayesNet::new();
        let a = net.constant_scalar(3.0);
        let b = net.constant_scalar(1.0);
        let s = net.add(a, b).unwrap();
        let t = net.subtract(a, b).unwrap();
        let d = net.multiply(s, t).unwrap();
        let _e = net.constant_scalar(42.0);
        (net, [a, b, s, t, d])
    }

    #[test]
    // Purpose
    // -------
    // Ancestors of the diamond output must include every diamond vertex
    // and exclude the unrelated island.
    fn ancestors_of_diamond_output() {
        let (net, [a, b, s, t, d]) = diamond();
        let anc = ancestors_inclusive(&net, &[d]);
        for id in [a, b, s, t, d] {
            assert!(anc.contains(&id));
        }
        assert_eq!(anc.len(), 5);
    }

    #[test]
    // Purpose
    // -------
    // connects_to_any from {a} must contain both diamond arms and the
    // output, but not b or the island.
    fn connects_to_one_source() {
        let (net, [a, b, s, t, d]) = diamond();
        let targets: HashSet<VertexId> = [a].into_iter().collect();
        let reach = connects_to_any(&net, &targets);
        for id in [a, s, t, d] {
            assert!(reach.contains(&id));
        }
        assert!(!reach.contains(&b));
        assert_eq!(reach.len(), 4);
    }
}
