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

//! Module that implements [`TopologyFormatter`] for marks and reconstructions.

use itertools::Itertools;
use ppm_topology::{formatter::TopologyFormatter, Topology};

use crate::{
    marking::{EdgeMark, NodeMark},
    reconstruction::{AttackGraph, NodeRanking, NodeReconstruction},
    simulation::Arrival,
};

impl<'a, 't> TopologyFormatter<'a, 't> for NodeMark {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        format!("({}, d={})", self.node.fmt(topo), self.distance)
    }
}

impl<'a, 't> TopologyFormatter<'a, 't> for EdgeMark {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        format!(
            "({} -> {}, d={})",
            self.start.fmt(topo),
            self.end.fmt(topo),
            self.distance
        )
    }
}

impl<'a, 't, M> TopologyFormatter<'a, 't> for Arrival<M>
where
    M: TopologyFormatter<'a, 't, Formatter = String> + 'a,
{
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        format!(
            "{} via {}: {}",
            self.source.fmt(topo),
            self.branch.fmt(topo),
            self.mark.fmt(topo)
        )
    }
}

impl<'a, 't> TopologyFormatter<'a, 't> for NodeRanking {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        (0..self.depth())
            .map(|d| {
                format!(
                    "{d}: {}",
                    self.level(d)
                        .iter()
                        .map(|(n, c)| format!("{} ({c})", n.fmt(topo)))
                        .join(", ")
                )
            })
            .join("\n")
    }
}

impl<'a, 't> TopologyFormatter<'a, 't> for NodeReconstruction {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        self.path.fmt(topo)
    }
}

impl<'a, 't> TopologyFormatter<'a, 't> for AttackGraph {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        format!(
            "{{{}}}",
            self.edges()
                .map(|((s, e), ev)| format!(
                    "{} -> {} (d={}, {}x)",
                    s.fmt(topo),
                    e.fmt(topo),
                    ev.distance,
                    ev.count
                ))
                .join(", ")
        )
    }
}
