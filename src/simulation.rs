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

//! Module for sending packets through a topology, marking them on the way.
//!
//! The [`Simulation`] forwards each packet hop by hop along the unique path from its source to the
//! victim. Every node on the path (except the victim) calls the marking scheme once, and the
//! victim finalizes the mark on arrival. All randomness is drawn from a single seeded generator,
//! such that two simulations with the same seed produce the same sequence of arrivals.

use std::collections::HashMap;

use log::debug;
use ppm_topology::{
    prelude::{NodeId, TopologyError},
    Topology,
};
use rand::prelude::*;
use thiserror::Error;

use crate::marking::MarkingScheme;

/// A packet that arrived at the victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Arrival<M> {
    /// The host that sent the packet.
    pub source: NodeId,
    /// The branch (victim-adjacent router) through which the packet arrived.
    pub branch: NodeId,
    /// The final mark of the packet.
    pub mark: M,
}

/// Number of packets sent by each host in a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Traffic {
    /// Packets sent by each attacker.
    pub attacker_packets: usize,
    /// Packets sent by each normal user.
    pub normal_packets: usize,
}

impl Traffic {
    /// Each attacker sends `x` packets per tick, while each normal user sends a single packet.
    pub fn new(x: usize) -> Self {
        Self {
            attacker_packets: x,
            normal_packets: 1,
        }
    }
}

/// Error while setting up or running a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// The topology is not valid.
    #[error("Invalid topology: {0}")]
    Topology(#[from] TopologyError),
    /// The node does not send any traffic.
    #[error("Node {0:?} is neither an attacker nor a normal user")]
    NotASource(NodeId),
}

/// Precomputed path of a source.
#[derive(Debug, Clone)]
struct Route {
    /// All nodes that mark the packet, starting with the source. The victim is not included.
    markers: Vec<NodeId>,
    /// The victim-adjacent router.
    branch: NodeId,
}

/// Simulation of packets flowing from all hosts to the victim.
#[derive(Debug)]
pub struct Simulation<'a, M> {
    /// The topology
    topo: &'a Topology,
    /// The marking scheme used by all routers
    scheme: M,
    /// The victim
    victim: NodeId,
    /// All normal users
    normal_users: Vec<NodeId>,
    /// All attackers
    attackers: Vec<NodeId>,
    /// Precomputed route of each source
    routes: HashMap<NodeId, Route>,
    /// Source of all randomness
    rng: StdRng,
}

impl<'a, M: MarkingScheme> Simulation<'a, M> {
    /// Create a new simulation. The topology is validated, and the paths of all hosts are
    /// precomputed. The seed fully determines the outcome of the simulation.
    pub fn new(topo: &'a Topology, scheme: M, seed: u64) -> Result<Self, SimError> {
        Self::with_rng(topo, scheme, StdRng::seed_from_u64(seed))
    }

    /// Create a new simulation that uses the given random number generator.
    pub fn with_rng(topo: &'a Topology, scheme: M, rng: StdRng) -> Result<Self, SimError> {
        topo.validate()?;
        let victim = topo.victim().ok_or(TopologyError::MissingVictim)?;

        let mut routes = HashMap::new();
        for source in topo.sources() {
            let mut markers = topo.path_to_victim(source)?;
            markers.pop();
            let branch = *markers.last().ok_or(TopologyError::IsVictim(source))?;
            routes.insert(source, Route { markers, branch });
        }

        let normal_users = topo.normal_users();
        let attackers = topo.attackers();
        debug!(
            "Simulate {} attackers and {} normal users (p = {})",
            attackers.len(),
            normal_users.len(),
            scheme.probability()
        );

        Ok(Self {
            topo,
            scheme,
            victim,
            normal_users,
            attackers,
            routes,
            rng,
        })
    }

    /// The topology of the simulation.
    pub fn topology(&self) -> &'a Topology {
        self.topo
    }

    /// The marking scheme.
    pub fn scheme(&self) -> &M {
        &self.scheme
    }

    /// The victim that receives all packets.
    pub fn victim(&self) -> NodeId {
        self.victim
    }

    /// All attackers, in increasing order of their id.
    pub fn attackers(&self) -> &[NodeId] {
        &self.attackers
    }

    /// All normal users.
    pub fn normal_users(&self) -> &[NodeId] {
        &self.normal_users
    }

    /// Send a single packet from `source` to the victim, and return its arrival.
    pub fn send(&mut self, source: NodeId) -> Result<Arrival<M::Mark>, SimError> {
        let route = self
            .routes
            .get(&source)
            .ok_or(SimError::NotASource(source))?;
        Ok(forward(
            &self.scheme,
            source,
            route,
            self.victim,
            &mut self.rng,
        ))
    }

    /// Perform a single tick: first, each normal user sends its packets, then each attacker sends
    /// its packets.
    pub fn tick(&mut self, traffic: &Traffic) -> Vec<Arrival<M::Mark>> {
        let mut arrivals = Vec::with_capacity(
            self.normal_users.len() * traffic.normal_packets
                + self.attackers.len() * traffic.attacker_packets,
        );
        let sources = self
            .normal_users
            .iter()
            .map(|u| (*u, traffic.normal_packets))
            .chain(self.attackers.iter().map(|a| (*a, traffic.attacker_packets)));
        for (source, num_packets) in sources {
            // all sources have a route, since they are taken from the same topology
            if let Some(route) = self.routes.get(&source) {
                for _ in 0..num_packets {
                    arrivals.push(forward(
                        &self.scheme,
                        source,
                        route,
                        self.victim,
                        &mut self.rng,
                    ));
                }
            }
        }
        arrivals
    }

    /// Perform `ticks` ticks, and return all arrivals in order.
    pub fn run(&mut self, traffic: &Traffic, ticks: usize) -> Vec<Arrival<M::Mark>> {
        (0..ticks).flat_map(|_| self.tick(traffic)).collect()
    }
}

/// Forward a single packet along its route.
fn forward<M: MarkingScheme, R: Rng + ?Sized>(
    scheme: &M,
    source: NodeId,
    route: &Route,
    victim: NodeId,
    rng: &mut R,
) -> Arrival<M::Mark> {
    let mark = route
        .markers
        .iter()
        .fold(M::Mark::default(), |mark, v| scheme.encode(mark, *v, rng));
    Arrival {
        source,
        branch: route.branch,
        mark: scheme.arrive(mark, victim),
    }
}

/// Simulate `ticks` ticks on the topology, and return all arrivals at the victim.
///
/// ```
/// use ppm_traceback::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let topo = Topology::line(3);
/// let arrivals = simulate(&topo, NodeSampling::new(0.5)?, Traffic::new(10), 2, 42)?;
/// // 10 packets from the attacker and 1 packet from the user in each tick.
/// assert_eq!(arrivals.len(), 22);
/// # Ok(())
/// # }
/// ```
pub fn simulate<M: MarkingScheme>(
    topo: &Topology,
    scheme: M,
    traffic: Traffic,
    ticks: usize,
    seed: u64,
) -> Result<Vec<Arrival<M::Mark>>, SimError> {
    Ok(Simulation::new(topo, scheme, seed)?.run(&traffic, ticks))
}
