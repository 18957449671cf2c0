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

//! # Top-level Topology module
//!
//! This module represents the network topology over which packets travel towards the victim.

use std::collections::HashSet;

use itertools::Itertools;
use petgraph::{
    visit::{EdgeRef, IntoEdgeReferences},
    Direction::{Incoming, Outgoing},
};
use serde::{Deserialize, Serialize};

use crate::types::{EdgeId, Node, NodeId, Role, TopologyError, TopologyGraph};

/// # Topology
///
/// The topology stores all nodes and all links of the network. Every link is directed from the
/// upstream node towards the victim, such that each source has a single next hop at every node
/// along its path.
///
/// ```rust
/// use ppm_topology::prelude::*;
///
/// fn main() -> Result<(), TopologyError> {
///     let mut topo = Topology::new();
///
///     let v = topo.add_node("victim");
///     let r = topo.add_node("r");
///     let a = topo.add_node("a");
///     let u = topo.add_node("u");
///     topo.add_link(r, v)?;
///     topo.add_link(a, r)?;
///     topo.add_link(u, v)?;
///
///     topo.set_victim(v)?;
///     topo.set_role(a, Role::Attacker)?;
///     topo.set_role(u, Role::NormalUser)?;
///
///     assert!(topo.is_valid());
///     assert_eq!(topo.path_to_victim(a)?, vec![a, r, v]);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub(crate) graph: TopologyGraph,
    pub(crate) victim: Option<NodeId>,
}

impl Topology {
    /// Create an empty topology without any node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new router to the topology and return its id.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        self.graph.add_node(Node::new(name))
    }

    /// Add a link from `upstream` towards `downstream`. If the link already exists, its id is
    /// returned without adding anything.
    pub fn add_link(
        &mut self,
        upstream: NodeId,
        downstream: NodeId,
    ) -> Result<EdgeId, TopologyError> {
        self.check(upstream)?;
        self.check(downstream)?;
        if upstream == downstream {
            return Err(TopologyError::SelfLoop(upstream));
        }
        Ok(match self.graph.find_edge(upstream, downstream) {
            Some(e) => e,
            None => self.graph.add_edge(upstream, downstream, ()),
        })
    }

    /// Make `node` the victim of the topology. The previous victim (if any) becomes a regular
    /// router.
    pub fn set_victim(&mut self, node: NodeId) -> Result<(), TopologyError> {
        self.check(node)?;
        if let Some(old) = self.victim.take() {
            if let Some(n) = self.graph.node_weight_mut(old) {
                n.role = Role::Router;
            }
        }
        self.graph[node].role = Role::Victim;
        self.victim = Some(node);
        Ok(())
    }

    /// Set the role of a node. Setting [`Role::Victim`] is equivalent to calling
    /// [`Topology::set_victim`].
    pub fn set_role(&mut self, node: NodeId, role: Role) -> Result<(), TopologyError> {
        self.check(node)?;
        if role == Role::Victim {
            return self.set_victim(node);
        }
        if self.victim == Some(node) {
            self.victim = None;
        }
        self.graph[node].role = role;
        Ok(())
    }

    /// Turn all attackers and normal users back into regular routers.
    pub fn clear_hosts(&mut self) {
        let hosts = self.sources();
        for n in hosts {
            self.graph[n].role = Role::Router;
        }
    }

    /// Return the victim, or `None` if the topology has no victim.
    pub fn victim(&self) -> Option<NodeId> {
        self.victim
    }

    /// Get the role of a node.
    pub fn role(&self, node: NodeId) -> Result<Role, TopologyError> {
        self.graph
            .node_weight(node)
            .map(|n| n.role)
            .ok_or(TopologyError::NodeNotFound(node))
    }

    /// Get the name of a node.
    pub fn name(&self, node: NodeId) -> Result<&str, TopologyError> {
        self.graph
            .node_weight(node)
            .map(|n| n.name.as_str())
            .ok_or(TopologyError::NodeNotFound(node))
    }

    /// Get the id of the node with the given name.
    pub fn node_id(&self, name: impl AsRef<str>) -> Result<NodeId, TopologyError> {
        self.graph
            .node_indices()
            .find(|n| self.graph[*n].name == name.as_ref())
            .ok_or_else(|| TopologyError::NodeNameNotFound(name.as_ref().to_string()))
    }

    /// Returns `true` if the node exists in the topology.
    pub fn contains(&self, node: NodeId) -> bool {
        self.graph.contains_node(node)
    }

    /// Number of nodes in the topology, including the victim and all hosts.
    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of links in the topology
    pub fn num_links(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterate over all nodes in the topology.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices()
    }

    /// Iterate over all links `(id, upstream, downstream)` in the topology.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, NodeId, NodeId)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (e.id(), e.source(), e.target()))
    }

    /// Get the id of the link from `upstream` towards `downstream`.
    pub fn edge_between(&self, upstream: NodeId, downstream: NodeId) -> Option<EdgeId> {
        self.graph.find_edge(upstream, downstream)
    }

    /// Returns `true` if `a` and `b` are connected by a link (in either direction).
    pub fn are_adjacent(&self, a: NodeId, b: NodeId) -> bool {
        self.graph.find_edge(a, b).is_some() || self.graph.find_edge(b, a).is_some()
    }

    /// Get the next hop of `node` towards the victim. Returns `Ok(None)` if the node has no
    /// downstream neighbor.
    pub fn next_hop(&self, node: NodeId) -> Result<Option<NodeId>, TopologyError> {
        self.check(node)?;
        let mut nhs = self.graph.neighbors_directed(node, Outgoing);
        match (nhs.next(), nhs.next()) {
            (None, _) => Ok(None),
            (Some(nh), None) => Ok(Some(nh)),
            (Some(_), Some(_)) => Err(TopologyError::MultipleNextHops(node)),
        }
    }

    /// Get all upstream neighbors of `node`, sorted by their id.
    pub fn upstream(&self, node: NodeId) -> Vec<NodeId> {
        self.graph
            .neighbors_directed(node, Incoming)
            .sorted()
            .collect()
    }

    /// Get the path from `source` to the victim. The path starts at `source` and ends at the
    /// victim, so its length is one more than the hop count.
    pub fn path_to_victim(&self, source: NodeId) -> Result<Vec<NodeId>, TopologyError> {
        let victim = self.victim.ok_or(TopologyError::MissingVictim)?;
        self.check(source)?;
        if source == victim {
            return Err(TopologyError::IsVictim(source));
        }

        let mut path = vec![source];
        let mut visited = HashSet::from([source]);
        let mut current = source;
        while current != victim {
            current = match self.next_hop(current)? {
                Some(nh) => nh,
                None => return Err(TopologyError::NoNextHop(current)),
            };
            path.push(current);
            if !visited.insert(current) {
                return Err(TopologyError::ForwardingLoop(path));
            }
        }
        Ok(path)
    }

    /// Number of hops from `node` to the victim. The victim itself has distance 0.
    pub fn hop_distance(&self, node: NodeId) -> Result<usize, TopologyError> {
        if self.victim == Some(node) {
            return Ok(0);
        }
        Ok(self.path_to_victim(node)?.len() - 1)
    }

    /// Get the branch of `node`, i.e., the victim-adjacent router through which all packets of
    /// `node` reach the victim.
    pub fn branch_of(&self, node: NodeId) -> Result<NodeId, TopologyError> {
        let path = self.path_to_victim(node)?;
        // the path contains at least the node and the victim.
        Ok(path[path.len() - 2])
    }

    /// Get all victim-adjacent routers, sorted by their id.
    pub fn victim_branches(&self) -> Vec<NodeId> {
        self.victim
            .map(|v| self.upstream(v))
            .unwrap_or_default()
    }

    /// Get all nodes without upstream neighbors (excluding the victim), sorted by their id.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|n| Some(*n) != self.victim)
            .filter(|n| self.graph.neighbors_directed(*n, Incoming).next().is_none())
            .sorted()
            .collect()
    }

    /// Get all nodes that generate traffic (attackers and normal users), sorted by their id.
    pub fn sources(&self) -> Vec<NodeId> {
        self.nodes_with(|r| r.is_source())
    }

    /// Get all attackers, sorted by their id.
    pub fn attackers(&self) -> Vec<NodeId> {
        self.nodes_with(|r| r == Role::Attacker)
    }

    /// Get all normal users, sorted by their id.
    pub fn normal_users(&self) -> Vec<NodeId> {
        self.nodes_with(|r| r == Role::NormalUser)
    }

    fn nodes_with(&self, f: impl Fn(Role) -> bool) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|n| f(self.graph[*n].role))
            .sorted()
            .collect()
    }

    /// Return an error if the node does not exist.
    #[inline]
    pub(crate) fn check(&self, node: NodeId) -> Result<(), TopologyError> {
        if self.graph.contains_node(node) {
            Ok(())
        } else {
            Err(TopologyError::NodeNotFound(node))
        }
    }
}
