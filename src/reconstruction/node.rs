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

//! Path reconstruction for node sampling.
//!
//! The victim counts how often it has seen each `(node, distance)` pair. Routers closer to the
//! victim overwrite the marks of routers further away, so the expected number of marks decreases
//! geometrically with the distance. The reconstruction walks outward from the victim, picking the
//! most frequent node at each distance, as long as that node is seen strictly more often than any
//! node one hop further out. If the collector knows the topology, the walk also stops at the first
//! node that is not linked to the previously accepted one.

use std::collections::HashMap;

use itertools::Itertools;
use log::trace;
use ppm_topology::{
    types::{NodeId, TopologyError},
    Topology,
};

use super::{Collector, ReconstructionError, Traceback};
use crate::marking::NodeMark;

/// Observed nodes, grouped by distance and sorted by their count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct NodeRanking {
    /// Nodes and their counts, indexed by the distance
    levels: Vec<Vec<(NodeId, usize)>>,
}

/// Group the observations `(node, distance)` by distance, and rank the nodes of each distance by
/// how often they were observed (most frequent first, ties broken by the node id).
pub fn rank_nodes<I>(observations: I) -> NodeRanking
where
    I: IntoIterator<Item = (NodeId, usize)>,
{
    NodeRanking::from_counts(&observations.into_iter().counts())
}

impl NodeRanking {
    /// Build the ranking from counts of `(node, distance)` pairs.
    pub fn from_counts(counts: &HashMap<(NodeId, usize), usize>) -> Self {
        let depth = counts.keys().map(|(_, d)| d + 1).max().unwrap_or(0);
        let mut levels: Vec<Vec<(NodeId, usize)>> = vec![Vec::new(); depth];
        for ((node, distance), count) in counts.iter() {
            if *count > 0 {
                levels[*distance].push((*node, *count));
            }
        }
        for level in levels.iter_mut() {
            level.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        }
        Self { levels }
    }

    /// Returns `true` if no node was observed.
    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|l| l.is_empty())
    }

    /// Number of distances (the largest observed distance plus one).
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// All nodes observed at the given distance, most frequent first.
    pub fn level(&self, distance: usize) -> &[(NodeId, usize)] {
        self.levels
            .get(distance)
            .map(|l| l.as_slice())
            .unwrap_or_default()
    }

    /// The most frequent node at the given distance, and its count.
    pub fn top(&self, distance: usize) -> Option<(NodeId, usize)> {
        self.level(distance).first().copied()
    }

    /// How often `node` was observed at `distance`.
    pub fn count(&self, node: NodeId, distance: usize) -> usize {
        self.level(distance)
            .iter()
            .find(|(n, _)| *n == node)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    /// Infer the attack path. Starting at distance 0, the most frequent node of each distance is
    /// accepted if its count is unique within that distance, and strictly larger than the count
    /// of the most frequent node at the next distance. The inference stops at the first distance
    /// that violates this.
    ///
    /// The returned path is ordered from the inferred origin towards `victim`, and ends with
    /// `victim`. If not even distance 0 can be inferred, the function returns
    /// [`ReconstructionError::Ambiguous`] (or [`ReconstructionError::NoMarks`] if nothing was
    /// observed at all).
    ///
    /// Without knowledge of the topology, the inferred path may contain nodes that are not
    /// connected. Use [`NodeRanking::infer_path_by`] to restrict the walk to existing links.
    pub fn infer_path(&self, victim: NodeId) -> Result<NodeReconstruction, ReconstructionError> {
        self.infer_path_by(victim, |_, _| true)
    }

    /// Infer the attack path like [`NodeRanking::infer_path`], but additionally stop as soon as
    /// the candidate at the next distance is not an upstream neighbor of the last accepted node.
    /// `is_upstream(candidate, node)` must return `true` if `candidate` forwards its packets
    /// directly to `node`.
    ///
    /// ```
    /// use maplit::hashmap;
    /// use ppm_traceback::{prelude::*, reconstruction::NodeRanking};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let topo = Topology::branches(&[2, 3]);
    /// let n = |name: &str| topo.node_id(name);
    /// let (v, r1, r2, r5) = (n("0")?, n("1")?, n("2")?, n("5")?);
    /// let ranking = NodeRanking::from_counts(&hashmap! {
    ///     (r1, 0) => 40, (r2, 1) => 20, (r5, 2) => 3,
    /// });
    /// let rec = ranking.infer_path_by(v, |a, b| topo.next_hop(a).ok().flatten() == Some(b))?;
    /// assert_eq!(rec.path, vec![r2, r1, v]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn infer_path_by<F>(
        &self,
        victim: NodeId,
        is_upstream: F,
    ) -> Result<NodeReconstruction, ReconstructionError>
    where
        F: Fn(NodeId, NodeId) -> bool,
    {
        if self.is_empty() {
            return Err(ReconstructionError::NoMarks);
        }

        let mut inferred: Vec<NodeId> = Vec::new();
        for distance in 0..self.depth() {
            let level = self.level(distance);
            let Some(&(node, count)) = level.first() else {
                break;
            };
            if level.get(1).map(|(_, c)| *c == count).unwrap_or(false) {
                trace!("tie at distance {distance}");
                break;
            }
            let next = self.top(distance + 1).map(|(_, c)| c).unwrap_or(0);
            if count <= next {
                trace!("count does not decrease at distance {distance} ({count} <= {next})");
                break;
            }
            if node == victim || inferred.contains(&node) {
                break;
            }
            let downstream = inferred.last().copied().unwrap_or(victim);
            if !is_upstream(node, downstream) {
                trace!("node {node:?} at distance {distance} is not upstream of {downstream:?}");
                break;
            }
            inferred.push(node);
        }

        if inferred.is_empty() {
            return Err(ReconstructionError::Ambiguous { distance: 0 });
        }

        let path = inferred
            .into_iter()
            .rev()
            .chain(std::iter::once(victim))
            .collect();
        Ok(NodeReconstruction {
            path,
            ranking: self.clone(),
        })
    }
}

/// Result of the node sampling reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct NodeReconstruction {
    /// Inferred path, from the origin to the victim (included). The path contains at least two
    /// nodes.
    pub path: Vec<NodeId>,
    /// The ranking from which the path was inferred.
    pub ranking: NodeRanking,
}

impl NodeReconstruction {
    /// The router closest to the victim.
    pub fn victim_adjacent(&self) -> NodeId {
        self.path[self.path.len() - 2]
    }

    /// The node furthest away from the victim.
    pub fn origin(&self) -> NodeId {
        self.path[0]
    }

    /// The victim.
    pub fn victim(&self) -> NodeId {
        self.path[self.path.len() - 1]
    }
}

impl Traceback for NodeReconstruction {
    fn paths(&self) -> Vec<Vec<NodeId>> {
        vec![self.path.clone()]
    }

    /// Node sampling can only recover a single path. The reconstruction is correct if it is the
    /// path of any attacker.
    fn matches(&self, truth: &[Vec<NodeId>]) -> bool {
        truth.contains(&self.path)
    }
}

/// Collects node sampling marks at the victim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCollector {
    /// The victim
    victim: NodeId,
    /// Next hop of every node, if the collector knows the topology
    next_hops: Option<HashMap<NodeId, NodeId>>,
    /// How often each `(node, distance)` was observed
    counts: HashMap<(NodeId, usize), usize>,
    /// Number of observed packets
    observed: usize,
}

impl NodeCollector {
    /// Create an empty collector that does not know the topology. The reconstruction uses
    /// [`NodeRanking::infer_path`].
    pub fn new(victim: NodeId) -> Self {
        Self {
            victim,
            next_hops: None,
            counts: HashMap::new(),
            observed: 0,
        }
    }

    /// Create an empty collector that only reconstructs paths along the links of `topo`.
    pub fn with_topology(topo: &Topology) -> Result<Self, TopologyError> {
        let victim = topo.victim().ok_or(TopologyError::MissingVictim)?;
        let mut next_hops = HashMap::new();
        for node in topo.nodes() {
            if let Some(nh) = topo.next_hop(node)? {
                next_hops.insert(node, nh);
            }
        }
        Ok(Self {
            next_hops: Some(next_hops),
            ..Self::new(victim)
        })
    }

    /// The current ranking of all observed nodes.
    pub fn ranking(&self) -> NodeRanking {
        NodeRanking::from_counts(&self.counts)
    }

    /// How often `node` was observed at `distance`.
    pub fn count(&self, node: NodeId, distance: usize) -> usize {
        self.counts.get(&(node, distance)).copied().unwrap_or(0)
    }
}

impl Collector for NodeCollector {
    type Mark = NodeMark;
    type Output = NodeReconstruction;

    fn observe(&mut self, mark: &NodeMark) {
        self.observed += 1;
        if let Some(node) = mark.node {
            *self.counts.entry((node, mark.distance)).or_default() += 1;
        }
    }

    fn num_observed(&self) -> usize {
        self.observed
    }

    fn reconstruct(&self) -> Result<NodeReconstruction, ReconstructionError> {
        let ranking = self.ranking();
        match self.next_hops.as_ref() {
            Some(next_hops) => ranking.infer_path_by(self.victim, |node, downstream| {
                next_hops.get(&node) == Some(&downstream)
            }),
            None => ranking.infer_path(self.victim),
        }
    }
}
