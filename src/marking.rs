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

//! Mark encoders for node sampling and edge sampling.
//!
//! Every router along the path of a packet (including the source host, but excluding the victim)
//! calls [`MarkingScheme::encode`] once. The encoder flips a coin with the marking probability
//! `p`, and returns the updated mark. Marks are plain values that are replaced on each hop, they
//! are never mutated in place.

use ppm_topology::{
    types::{NodeId, TopologyError},
    Topology,
};
use rand::Rng;
use thiserror::Error;

use crate::reconstruction::{Collector, EdgeCollector, NodeCollector, DEFAULT_SUPPORT};

/// Sampling discipline used to mark packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Discipline {
    /// Each router writes its own identifier (see [`NodeSampling`]).
    Node,
    /// Each router writes the start of an edge, and the next router its end (see
    /// [`EdgeSampling`]).
    Edge,
}

impl std::fmt::Display for Discipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discipline::Node => f.write_str("node"),
            Discipline::Edge => f.write_str("edge"),
        }
    }
}

/// Error while setting up a marking scheme.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum MarkingError {
    /// The marking probability must be in `(0, 1]`.
    #[error("Marking probability must be in (0, 1], but got {0}")]
    InvalidProbability(f64),
    /// The support threshold of the edge reconstruction must be in `(0, 1]`.
    #[error("Support threshold must be in (0, 1], but got {0}")]
    InvalidSupport(f64),
}

/// Check that `p` is in `(0, 1]`.
fn check_probability(p: f64) -> Result<f64, MarkingError> {
    if p > 0.0 && p <= 1.0 {
        Ok(p)
    } else {
        Err(MarkingError::InvalidProbability(p))
    }
}

/// A probabilistic packet marking scheme. The scheme defines how a router updates the mark of a
/// packet, and how the victim collects marks to reconstruct the attack.
pub trait MarkingScheme {
    /// The mark carried in each packet.
    type Mark: Copy + Default + PartialEq + std::fmt::Debug;
    /// The victim-side structure that collects marks and reconstructs the attack.
    type Collector: Collector<Mark = Self::Mark>;

    /// The marking probability `p`.
    fn probability(&self) -> f64;

    /// Update the mark at `router`, given the outcome of the coin flip. If `overwrite` is `true`,
    /// the router decided to mark the packet.
    fn step(&self, mark: Self::Mark, router: NodeId, overwrite: bool) -> Self::Mark;

    /// Update the mark at `router`, flipping a coin that lands on `overwrite` with the marking
    /// probability.
    fn encode<R: Rng + ?Sized>(&self, mark: Self::Mark, router: NodeId, rng: &mut R) -> Self::Mark {
        let overwrite = rng.gen_bool(self.probability());
        self.step(mark, router, overwrite)
    }

    /// Finalize the mark once the packet reaches the victim.
    fn arrive(&self, mark: Self::Mark, _victim: NodeId) -> Self::Mark {
        mark
    }

    /// Create an empty collector for the given victim.
    fn collector(&self, victim: NodeId) -> Self::Collector;

    /// Create an empty collector for the victim of `topo`. Collectors may use the links of the
    /// topology to discard impossible reconstructions.
    fn collector_for(&self, topo: &Topology) -> Result<Self::Collector, TopologyError> {
        Ok(self.collector(topo.victim().ok_or(TopologyError::MissingVictim)?))
    }
}

/// Mark used for node sampling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct NodeMark {
    /// The router that marked the packet last, or `None` if no router marked the packet.
    pub node: Option<NodeId>,
    /// Number of routers that forwarded the packet after `node`.
    pub distance: usize,
}

/// # Node sampling
///
/// At each router `v`, with probability `p`, the router writes `v` into the mark and resets the
/// distance to 0. Otherwise, it increments the distance. At the victim, the distance of a mark is
/// the number of routers between the marking router and the victim; the victim-adjacent router
/// thus marks with distance 0.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct NodeSampling {
    /// Marking probability
    p: f64,
}

impl NodeSampling {
    /// Create node sampling with marking probability `p`.
    pub fn new(p: f64) -> Result<Self, MarkingError> {
        Ok(Self {
            p: check_probability(p)?,
        })
    }
}

impl MarkingScheme for NodeSampling {
    type Mark = NodeMark;
    type Collector = NodeCollector;

    fn probability(&self) -> f64 {
        self.p
    }

    fn step(&self, mark: NodeMark, router: NodeId, overwrite: bool) -> NodeMark {
        if overwrite {
            NodeMark {
                node: Some(router),
                distance: 0,
            }
        } else {
            NodeMark {
                distance: mark.distance + 1,
                ..mark
            }
        }
    }

    fn collector(&self, victim: NodeId) -> NodeCollector {
        NodeCollector::new(victim)
    }

    fn collector_for(&self, topo: &Topology) -> Result<NodeCollector, TopologyError> {
        NodeCollector::with_topology(topo)
    }
}

/// Mark used for edge sampling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EdgeMark {
    /// The router that started the edge.
    pub start: Option<NodeId>,
    /// The next node after `start`, written by that node.
    pub end: Option<NodeId>,
    /// Number of hops since `start` marked the packet.
    pub distance: usize,
}

impl EdgeMark {
    /// Returns the edge `(start, end)` if both ends are written.
    pub fn edge(&self) -> Option<(NodeId, NodeId)> {
        Some((self.start?, self.end?))
    }

    /// Returns `true` if both ends of the edge are written.
    pub fn is_fixed(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

/// # Edge sampling
///
/// At each router `v`, with probability `p`, the router starts a new edge: it writes `v` as the
/// start, clears the end, and resets the distance to 0. Otherwise, if the edge was started by the
/// previous router (the distance is 0), `v` writes itself as the end of the edge. In both cases
/// where `v` does not mark, the distance is incremented. If the last router marks the packet, the
/// victim completes the edge.
///
/// At the victim, the distance of a fixed mark equals the hop distance from the end of the edge to
/// the victim.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EdgeSampling {
    /// Marking probability
    p: f64,
    /// Support threshold used by the collector
    support: f64,
}

impl EdgeSampling {
    /// Create edge sampling with marking probability `p`.
    pub fn new(p: f64) -> Result<Self, MarkingError> {
        Ok(Self {
            p: check_probability(p)?,
            support: DEFAULT_SUPPORT,
        })
    }

    /// Set the support threshold used by the victim to prune weak edges. See
    /// [`crate::reconstruction::build_attack_graph`].
    pub fn with_support(self, support: f64) -> Result<Self, MarkingError> {
        if support > 0.0 && support <= 1.0 {
            Ok(Self { support, ..self })
        } else {
            Err(MarkingError::InvalidSupport(support))
        }
    }

    /// The support threshold used by the victim.
    pub fn support(&self) -> f64 {
        self.support
    }
}

impl MarkingScheme for EdgeSampling {
    type Mark = EdgeMark;
    type Collector = EdgeCollector;

    fn probability(&self) -> f64 {
        self.p
    }

    fn step(&self, mark: EdgeMark, router: NodeId, overwrite: bool) -> EdgeMark {
        if overwrite {
            EdgeMark {
                start: Some(router),
                end: None,
                distance: 0,
            }
        } else if mark.start.is_some() && mark.distance == 0 {
            EdgeMark {
                end: Some(router),
                distance: 1,
                ..mark
            }
        } else {
            EdgeMark {
                distance: mark.distance + 1,
                ..mark
            }
        }
    }

    fn arrive(&self, mark: EdgeMark, victim: NodeId) -> EdgeMark {
        if mark.start.is_some() && mark.end.is_none() {
            EdgeMark {
                end: Some(victim),
                ..mark
            }
        } else {
            mark
        }
    }

    fn collector(&self, victim: NodeId) -> EdgeCollector {
        EdgeCollector::new(victim, self.support)
    }
}
