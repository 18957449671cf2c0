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

//! Validation of topologies. All checks are pure functions over the graph structure and the
//! assigned roles, and they are independent of any marking or reconstruction algorithm.

use std::collections::HashMap;

use log::debug;
use petgraph::Direction::Outgoing;
use serde::{Deserialize, Serialize};

use crate::{
    types::{NodeId, TopologyError},
    Topology,
};

impl Topology {
    /// Check that the topology is a tree rooted at the victim, i.e., that a victim exists, that the
    /// victim has no downstream neighbor, and that every other node has a single, loop-free path
    /// towards the victim. Roles of the sources are not checked.
    pub fn validate_structure(&self) -> Result<(), TopologyError> {
        let victim = self.victim.ok_or(TopologyError::MissingVictim)?;
        if self
            .graph
            .neighbors_directed(victim, Outgoing)
            .next()
            .is_some()
        {
            return Err(TopologyError::VictimHasNextHop(victim));
        }
        for node in self.nodes().filter(|n| *n != victim) {
            self.path_to_victim(node)?;
        }
        Ok(())
    }

    /// Check that the topology can be used for a simulation. In addition to
    /// [`Topology::validate_structure`], this requires exactly one normal user, at least one
    /// attacker, and that no two attackers share the same branch.
    pub fn validate(&self) -> Result<(), TopologyError> {
        self.validate_structure()?;

        let normal = self.normal_users();
        match normal.len() {
            0 => return Err(TopologyError::NoNormalUser),
            1 => {}
            _ => return Err(TopologyError::MultipleNormalUsers(normal)),
        }

        let attackers = self.attackers();
        if attackers.is_empty() {
            return Err(TopologyError::NoAttacker);
        }
        let mut branches: HashMap<NodeId, NodeId> = HashMap::new();
        for attacker in attackers {
            let branch = self.branch_of(attacker)?;
            if let Some(first) = branches.insert(branch, attacker) {
                return Err(TopologyError::SharedBranch {
                    branch,
                    first,
                    second: attacker,
                });
            }
        }

        Ok(())
    }

    /// Returns `true` if [`Topology::validate`] succeeds.
    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                debug!("Invalid topology: {e}");
                false
            }
        }
    }
}

/// Size constraints on tree topologies, as used for the reference experiments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConstraints {
    /// Minimum number of nodes, excluding the victim
    pub min_routers: usize,
    /// Maximum number of nodes, excluding the victim
    pub max_routers: usize,
    /// Allowed number of victim-adjacent routers
    pub branches: Vec<usize>,
    /// Maximum hop distance of any node to the victim.
    pub max_hops: usize,
}

impl Default for TreeConstraints {
    fn default() -> Self {
        Self {
            min_routers: 10,
            max_routers: 20,
            branches: vec![3, 4, 5],
            max_hops: 15,
        }
    }
}

impl TreeConstraints {
    /// Check that the topology is a tree (see [`Topology::validate_structure`]) and satisfies all
    /// size constraints.
    pub fn check(&self, topo: &Topology) -> Result<(), TopologyError> {
        topo.validate_structure()?;

        let routers = topo.num_nodes() - 1;
        if routers < self.min_routers || routers > self.max_routers {
            return Err(TopologyError::RouterCount {
                found: routers,
                min: self.min_routers,
                max: self.max_routers,
            });
        }

        let branches = topo.victim_branches().len();
        if !self.branches.contains(&branches) {
            return Err(TopologyError::BranchCount {
                found: branches,
                allowed: self.branches.clone(),
            });
        }

        let mut depth = 0;
        for node in topo.nodes() {
            depth = depth.max(topo.hop_distance(node)?);
        }
        if depth > self.max_hops {
            return Err(TopologyError::TooDeep {
                found: depth,
                max: self.max_hops,
            });
        }

        Ok(())
    }
}
