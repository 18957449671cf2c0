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

//! Module containing all type definitions

use petgraph::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) type IndexType = u32;
/// Node identification (and index into the graph)
pub type NodeId = NodeIndex<IndexType>;
/// Edge identification. This index is stable for the lifetime of the topology, and distinguishes
/// each link from all others.
pub type EdgeId = EdgeIndex<IndexType>;
/// The underlying graph. Every edge points from the upstream node towards the victim.
pub(crate) type TopologyGraph = StableGraph<Node, (), Directed, IndexType>;

/// Role of a node in the topology.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Role {
    /// The victim, i.e., the root of the topology that receives all packets.
    Victim,
    /// Intermediate router that only forwards (and marks) packets.
    #[default]
    Router,
    /// Source of legitimate traffic.
    NormalUser,
    /// Source of attack traffic.
    Attacker,
}

impl Role {
    /// Returns `true` if the node with this role generates traffic.
    pub fn is_source(&self) -> bool {
        matches!(self, Self::NormalUser | Self::Attacker)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Victim => f.write_str("victim"),
            Role::Router => f.write_str("router"),
            Role::NormalUser => f.write_str("normal user"),
            Role::Attacker => f.write_str("attacker"),
        }
    }
}

/// A node stored in the topology graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Name of the node
    pub(crate) name: String,
    /// Role of the node
    pub(crate) role: Role,
}

impl Node {
    /// Create a new router with the given name.
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Router,
        }
    }

    /// Get the name of the node
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the role of the node
    pub fn role(&self) -> Role {
        self.role
    }
}

/// Topology Errors
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Node is not present in the topology
    #[error("Node was not found in topology: {0:?}")]
    NodeNotFound(NodeId),
    /// Node name is not present in the topology
    #[error("Node name was not found in topology: {0}")]
    NodeNameNotFound(String),
    /// A link from a node to itself was requested.
    #[error("Cannot add a link from {0:?} to itself")]
    SelfLoop(NodeId),
    /// The topology has no victim.
    #[error("The topology does not have a victim")]
    MissingVictim,
    /// The operation is not defined on the victim (e.g., the victim cannot send packets to itself).
    #[error("The node {0:?} is the victim")]
    IsVictim(NodeId),
    /// The victim forwards packets further.
    #[error("The victim {0:?} has a downstream neighbor")]
    VictimHasNextHop(NodeId),
    /// Black hole detected
    #[error("Node {0:?} has no path towards the victim")]
    NoNextHop(NodeId),
    /// A node has multiple links towards the victim, so its path is not fixed.
    #[error("Node {0:?} has multiple downstream neighbors")]
    MultipleNextHops(NodeId),
    /// Forwarding loop detected
    #[error("Forwarding loop occurred! path: {0:?}")]
    ForwardingLoop(Vec<NodeId>),
    /// No normal user is designated.
    #[error("The topology does not have a normal user")]
    NoNormalUser,
    /// More than one normal user is designated.
    #[error("The topology has more than one normal user: {0:?}")]
    MultipleNormalUsers(Vec<NodeId>),
    /// No attacker is designated.
    #[error("The topology does not have an attacker")]
    NoAttacker,
    /// Two attackers share the same branch.
    #[error("Attackers {first:?} and {second:?} share the branch {branch:?}")]
    SharedBranch {
        /// The victim-adjacent router of the branch
        branch: NodeId,
        /// The first attacker found in the branch
        first: NodeId,
        /// The second attacker found in the branch
        second: NodeId,
    },
    /// Not enough branches to place one attacker per branch.
    #[error("Cannot place {requested} attackers on {available} branches")]
    NotEnoughBranches {
        /// Number of requested attackers
        requested: usize,
        /// Number of available branches
        available: usize,
    },
    /// Not enough leaves to place all hosts.
    #[error("Cannot place {requested} normal users on {available} remaining leaves")]
    NotEnoughLeaves {
        /// Number of requested hosts
        requested: usize,
        /// Number of available leaves
        available: usize,
    },
    /// The number of routers violates the tree constraints.
    #[error("Router count must be {min}-{max} excluding the victim. Found {found}")]
    RouterCount {
        /// Number of routers found
        found: usize,
        /// Minimum number of routers
        min: usize,
        /// Maximum number of routers
        max: usize,
    },
    /// The number of branches violates the tree constraints.
    #[error("Branch count must be in {allowed:?}. Found {found}")]
    BranchCount {
        /// Number of branches found
        found: usize,
        /// Allowed number of branches
        allowed: Vec<usize>,
    },
    /// The topology is too deep.
    #[error("Max hop depth must be <= {max}. Found {found}")]
    TooDeep {
        /// Largest hop distance found
        found: usize,
        /// Largest hop distance allowed
        max: usize,
    },
    /// Cannot parse the topology file.
    #[error("Cannot parse line {line}: {reason}")]
    Parse {
        /// Line number (starting at 1)
        line: usize,
        /// Reason why the line cannot be parsed
        reason: String,
    },
    /// Cannot read the topology file.
    #[error("Cannot read the topology file: {0}")]
    Io(#[from] std::io::Error),
}
