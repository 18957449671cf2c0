// PPM-Traceback: Probabilistic packet marking for IP traceback
// Copyright (C) 2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Attack graph reconstruction for edge sampling.
//!
//! The victim counts how often it has seen each edge `(start, end)` at each distance. The graph is
//! built layer by layer, starting at the victim: an edge at distance `d` is only considered if its
//! end was accepted as the start of an edge at distance `d - 1` (or is the victim for `d = 0`).
//! Among all candidate edges leading into the same node, only those with enough support (relative
//! to the strongest candidate) are kept.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use itertools::Itertools;
use log::trace;
use ppm_topology::types::NodeId;

use super::{Collector, ReconstructionError, Traceback};
use crate::marking::EdgeMark;

/// Default support threshold for edges. An edge into a node is kept if its count is at least this
/// fraction of the strongest edge into the same node.
pub const DEFAULT_SUPPORT: f64 = 0.25;

/// Evidence for an edge in the attack graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EdgeEvidence {
    /// Hop distance from the end of the edge to the victim.
    pub distance: usize,
    /// How often the edge was observed at that distance.
    pub count: usize,
}

/// Reconstructed attack graph, i.e., a tree of edges rooted at the victim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackGraph {
    /// The root of the graph
    victim: NodeId,
    /// All edges `(start, end)`
    edges: BTreeMap<(NodeId, NodeId), EdgeEvidence>,
}

/// Build the attack graph from the edge counts `(start, end, distance) -> count`. See the
/// [module documentation](self) for the algorithm. `support` is the fraction of the strongest
/// inbound edge that an edge must reach to be kept.
///
/// Returns [`ReconstructionError::NoMarks`] if `counts` contains no observation, and
/// [`ReconstructionError::Ambiguous`] if no edge towards the victim exists.
pub fn build_attack_graph(
    counts: &HashMap<(NodeId, NodeId, usize), usize>,
    victim: NodeId,
    support: f64,
) -> Result<AttackGraph, ReconstructionError> {
    if counts.values().all(|c| *c == 0) {
        return Err(ReconstructionError::NoMarks);
    }

    let by_distance = counts
        .iter()
        .filter(|(_, c)| **c > 0)
        .map(|((start, end, distance), count)| (*distance, (*start, *end, *count)))
        .into_group_map();
    let max_distance = by_distance.keys().max().copied().unwrap_or(0);

    let mut edges: BTreeMap<(NodeId, NodeId), EdgeEvidence> = BTreeMap::new();
    let mut in_graph: HashSet<NodeId> = HashSet::from([victim]);
    let mut frontier: HashSet<NodeId> = HashSet::from([victim]);

    for distance in 0..=max_distance {
        let Some(candidates) = by_distance.get(&distance) else {
            break;
        };

        let mut inbound: BTreeMap<NodeId, Vec<(NodeId, usize)>> = BTreeMap::new();
        for (start, end, count) in candidates.iter() {
            if frontier.contains(end) && !in_graph.contains(start) {
                inbound.entry(*end).or_default().push((*start, *count));
            }
        }

        let mut next_frontier: HashSet<NodeId> = HashSet::new();
        for (end, starts) in inbound {
            let strongest = starts.iter().map(|(_, c)| *c).max().unwrap_or(0);
            let threshold = support * strongest as f64;
            for (start, count) in starts {
                if count as f64 >= threshold {
                    edges.insert((start, end), EdgeEvidence { distance, count });
                    next_frontier.insert(start);
                } else {
                    trace!("prune edge at distance {distance} with count {count} < {threshold}");
                }
            }
        }

        if next_frontier.is_empty() {
            break;
        }
        in_graph.extend(next_frontier.iter().copied());
        frontier = next_frontier;
    }

    if edges.is_empty() {
        return Err(ReconstructionError::Ambiguous { distance: 0 });
    }

    Ok(AttackGraph { victim, edges })
}

impl AttackGraph {
    /// The victim at the root of the graph.
    pub fn victim(&self) -> NodeId {
        self.victim
    }

    /// Number of edges in the graph.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if the graph has no edge.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Iterate over all edges `(start, end)` and their evidence.
    pub fn edges(&self) -> impl Iterator<Item = ((NodeId, NodeId), EdgeEvidence)> + '_ {
        self.edges.iter().map(|(e, ev)| (*e, *ev))
    }

    /// Get the evidence of the edge `(start, end)`, if it is part of the graph.
    pub fn get(&self, start: NodeId, end: NodeId) -> Option<EdgeEvidence> {
        self.edges.get(&(start, end)).copied()
    }

    /// Returns `true` if the edge `(start, end)` is part of the graph.
    pub fn contains_edge(&self, start: NodeId, end: NodeId) -> bool {
        self.edges.contains_key(&(start, end))
    }

    /// All nodes in the graph, including the victim.
    pub fn nodes(&self) -> BTreeSet<NodeId> {
        self.edges
            .keys()
            .flat_map(|(s, e)| [*s, *e])
            .chain(std::iter::once(self.victim))
            .collect()
    }

    /// All edges that end at the victim.
    pub fn root_edges(&self) -> Vec<(NodeId, NodeId)> {
        self.edges
            .keys()
            .filter(|(_, e)| *e == self.victim)
            .copied()
            .collect()
    }

    /// All nodes without any inbound edge, i.e., the inferred origins of the attack.
    pub fn origins(&self) -> Vec<NodeId> {
        let ends: HashSet<NodeId> = self.edges.keys().map(|(_, e)| *e).collect();
        self.edges
            .keys()
            .map(|(s, _)| *s)
            .filter(|s| !ends.contains(s))
            .unique()
            .sorted()
            .collect()
    }

    /// The path from `origin` to the victim (included), following the strongest outbound edge of
    /// each node. Returns `None` if `origin` is not part of the graph, or if the victim cannot be
    /// reached.
    pub fn path_from(&self, origin: NodeId) -> Option<Vec<NodeId>> {
        let mut path = vec![origin];
        let mut current = origin;
        while current != self.victim {
            let (_, next) = self
                .edges
                .iter()
                .filter(|((s, _), _)| *s == current)
                .max_by(|(a, ea), (b, eb)| ea.count.cmp(&eb.count).then(b.1.cmp(&a.1)))
                .map(|(e, _)| *e)?;
            if path.contains(&next) {
                return None;
            }
            path.push(next);
            current = next;
        }
        Some(path)
    }
}

impl Traceback for AttackGraph {
    fn paths(&self) -> Vec<Vec<NodeId>> {
        self.origins()
            .into_iter()
            .filter_map(|o| self.path_from(o))
            .collect()
    }

    /// The reconstruction is correct if the set of paths equals the set of attack paths.
    fn matches(&self, truth: &[Vec<NodeId>]) -> bool {
        let found: HashSet<Vec<NodeId>> = self.paths().into_iter().collect();
        let expected: HashSet<Vec<NodeId>> = truth.iter().cloned().collect();
        found == expected
    }
}

/// Collects edge sampling marks at the victim.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCollector {
    /// The victim
    victim: NodeId,
    /// Support threshold passed to [`build_attack_graph`]
    support: f64,
    /// How often each `(start, end, distance)` was observed
    counts: HashMap<(NodeId, NodeId, usize), usize>,
    /// Number of observed packets
    observed: usize,
}

impl EdgeCollector {
    /// Create an empty collector with the given support threshold.
    pub fn new(victim: NodeId, support: f64) -> Self {
        Self {
            victim,
            support,
            counts: HashMap::new(),
            observed: 0,
        }
    }

    /// How often the edge `(start, end)` was observed at `distance`.
    pub fn count(&self, start: NodeId, end: NodeId, distance: usize) -> usize {
        self.counts
            .get(&(start, end, distance))
            .copied()
            .unwrap_or(0)
    }

    /// All edge counts observed so far.
    pub fn counts(&self) -> &HashMap<(NodeId, NodeId, usize), usize> {
        &self.counts
    }
}

impl Collector for EdgeCollector {
    type Mark = EdgeMark;
    type Output = AttackGraph;

    fn observe(&mut self, mark: &EdgeMark) {
        self.observed += 1;
        if let Some((start, end)) = mark.edge() {
            *self.counts.entry((start, end, mark.distance)).or_default() += 1;
        }
    }

    fn num_observed(&self) -> usize {
        self.observed
    }

    fn reconstruct(&self) -> Result<AttackGraph, ReconstructionError> {
        build_attack_graph(&self.counts, self.victim, self.support)
    }
}
