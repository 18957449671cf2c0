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

//! Module for building topologies quickly, and for placing hosts randomly.

#[cfg(feature = "rand")]
use std::collections::BTreeMap;

#[cfg(feature = "rand")]
use log::debug;
#[cfg(feature = "rand")]
use rand::prelude::*;

use crate::{
    types::{NodeId, Role},
    Topology,
};
#[cfg(feature = "rand")]
use crate::types::TopologyError;

impl Topology {
    /// Build a line topology `attacker -> R1 -> ... -> Rn -> victim`. In addition, a normal user
    /// `user` is directly connected to the victim on a separate branch. For `n = 0`, the attacker
    /// is directly connected to the victim.
    ///
    /// ```
    /// use ppm_topology::prelude::*;
    ///
    /// # fn main() -> Result<(), TopologyError> {
    /// let topo = Topology::line(2);
    /// let path = topo.path_to_victim(topo.node_id("attacker")?)?;
    /// assert_eq!(path.fmt(&topo), "attacker -> R1 -> R2 -> victim");
    /// # Ok(())
    /// # }
    /// ```
    pub fn line(n: usize) -> Self {
        let mut topo = Self::new();
        let victim = topo.add_node("victim");
        topo.graph[victim].role = Role::Victim;
        topo.victim = Some(victim);

        let routers: Vec<NodeId> = (1..=n).map(|i| topo.add_node(format!("R{i}"))).collect();
        let attacker = topo.add_node("attacker");
        topo.graph[attacker].role = Role::Attacker;
        let user = topo.add_node("user");
        topo.graph[user].role = Role::NormalUser;

        let mut last = attacker;
        for r in routers.into_iter().chain(std::iter::once(victim)) {
            topo.graph.add_edge(last, r, ());
            last = r;
        }
        topo.graph.add_edge(user, victim, ());

        topo
    }

    /// Build a topology where the victim `0` has one chain of routers for each entry in
    /// `lengths`. Nodes are named by increasing integers, starting with the first branch at the
    /// victim. No hosts are assigned; use [`Topology::choose_hosts`] or [`Topology::set_role`].
    ///
    /// ```
    /// use ppm_topology::prelude::*;
    ///
    /// # fn main() -> Result<(), TopologyError> {
    /// let topo = Topology::branches(&[2, 1]);
    /// assert_eq!(topo.num_nodes(), 4);
    /// let leaf = topo.node_id("2")?;
    /// assert_eq!(topo.path_to_victim(leaf)?.fmt(&topo), "2 -> 1 -> 0");
    /// # Ok(())
    /// # }
    /// ```
    pub fn branches(lengths: &[usize]) -> Self {
        let mut topo = Self::new();
        let victim = topo.add_node("0");
        topo.graph[victim].role = Role::Victim;
        topo.victim = Some(victim);

        let mut next_name = 1;
        for len in lengths {
            let mut downstream = victim;
            for _ in 0..*len {
                let r = topo.add_node(next_name.to_string());
                next_name += 1;
                topo.graph.add_edge(r, downstream, ());
                downstream = r;
            }
        }

        topo
    }

    /// Randomly place attackers and normal users on the leaves of the topology. Attackers are
    /// placed on different branches: the branches are shuffled, and a random leaf of each of the
    /// first `num_attackers` branches becomes an attacker. The normal users are drawn from the
    /// remaining leaves. All previously assigned hosts are removed.
    ///
    /// ```
    /// use ppm_topology::prelude::*;
    /// use rand::prelude::*;
    ///
    /// # fn main() -> Result<(), TopologyError> {
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let topo = Topology::branches(&[3, 2, 4]).choose_hosts(&mut rng, 2, 1)?;
    /// assert_eq!(topo.attackers().len(), 2);
    /// assert_eq!(topo.normal_users().len(), 1);
    /// assert!(topo.is_valid());
    /// # Ok(())
    /// # }
    /// ```
    #[cfg(feature = "rand")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rand")))]
    pub fn choose_hosts<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        num_attackers: usize,
        num_normal: usize,
    ) -> Result<Self, TopologyError> {
        self.validate_structure()?;
        let mut topo = self.clone();
        topo.clear_hosts();

        let leaves = topo.leaves();
        let mut by_branch: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for leaf in leaves.iter() {
            by_branch
                .entry(topo.branch_of(*leaf)?)
                .or_default()
                .push(*leaf);
        }

        let mut branches: Vec<NodeId> = by_branch.keys().copied().collect();
        if branches.len() < num_attackers {
            return Err(TopologyError::NotEnoughBranches {
                requested: num_attackers,
                available: branches.len(),
            });
        }
        branches.shuffle(rng);

        let mut attackers = Vec::with_capacity(num_attackers);
        for branch in branches.into_iter().take(num_attackers) {
            if let Some(leaf) = by_branch.get(&branch).and_then(|l| l.choose(rng)) {
                attackers.push(*leaf);
            }
        }

        let mut remaining: Vec<NodeId> = leaves
            .into_iter()
            .filter(|l| !attackers.contains(l))
            .collect();
        if remaining.len() < num_normal {
            return Err(TopologyError::NotEnoughLeaves {
                requested: num_normal,
                available: remaining.len(),
            });
        }
        remaining.shuffle(rng);

        for a in attackers.iter() {
            topo.graph[*a].role = Role::Attacker;
        }
        for u in remaining.into_iter().take(num_normal) {
            topo.graph[u].role = Role::NormalUser;
        }
        debug!("Placed attackers on {:?}", attackers);

        Ok(topo)
    }
}
