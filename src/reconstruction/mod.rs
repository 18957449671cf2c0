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

//! This module is responsible for reconstructing the attack path from the marks collected at the
//! victim. Node sampling recovers a single path by ranking the observed routers by their distance
//! (see [`node`]), while edge sampling recovers an attack graph that may contain several branches
//! (see [`edge`]).

use std::fmt::Debug;

use ppm_topology::types::NodeId;
use thiserror::Error;

pub mod edge;
pub mod node;

pub use edge::{build_attack_graph, AttackGraph, EdgeCollector, EdgeEvidence, DEFAULT_SUPPORT};
pub use node::{rank_nodes, NodeCollector, NodeRanking, NodeReconstruction};

/// Error while reconstructing the attack path.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionError {
    /// The victim has not received a single marked packet.
    #[error("No marked packet was received")]
    NoMarks,
    /// There is no unique answer at the given distance.
    #[error("The reconstruction is ambiguous at distance {distance}")]
    Ambiguous {
        /// Distance at which the reconstruction stopped.
        distance: usize,
    },
}

/// The result of a reconstruction, describing one or multiple paths towards the victim.
pub trait Traceback {
    /// The reconstructed paths, each ordered from the origin to the victim (included).
    fn paths(&self) -> Vec<Vec<NodeId>>;

    /// Check if the reconstruction identifies the attack given the ground truth, i.e., the paths
    /// of all attackers.
    fn matches(&self, truth: &[Vec<NodeId>]) -> bool;
}

/// Victim-side state that accumulates marks and reconstructs the attack.
pub trait Collector: Debug {
    /// The mark type that is collected.
    type Mark;
    /// The result of the reconstruction.
    type Output: Traceback + Debug;

    /// Record the mark of a packet that arrived at the victim.
    fn observe(&mut self, mark: &Self::Mark);

    /// Number of packets observed so far (including packets without any mark).
    fn num_observed(&self) -> usize;

    /// Reconstruct the attack from all marks observed so far. This does not consume the collected
    /// marks, so it can be called repeatedly while packets arrive.
    fn reconstruct(&self) -> Result<Self::Output, ReconstructionError>;
}
