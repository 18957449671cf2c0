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

//! Module that introduces a formatter to display all types containing `NodeId`.

use std::collections::{BTreeSet, HashSet};

use itertools::Itertools;

use crate::{
    types::{NodeId, TopologyError},
    Topology,
};

/// Trait to format a type that contains NodeIds
pub trait TopologyFormatter<'a, 't> {
    /// Type that is returned, which implements `std::fmt::Display`.
    type Formatter;

    /// Return a struct that can be formatted and displayed. Unknown nodes are shown as `?`.
    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter;
}

impl<'a, 't> TopologyFormatter<'a, 't> for NodeId {
    type Formatter = &'t str;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        topo.name(*self).unwrap_or("?")
    }
}

impl<'a, 't> TopologyFormatter<'a, 't> for Option<NodeId> {
    type Formatter = &'t str;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        match self {
            Some(n) => n.fmt(topo),
            None => "-",
        }
    }
}

//
// Paths
//
impl<'a, 't> TopologyFormatter<'a, 't> for [NodeId] {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        self.iter().map(|n| n.fmt(topo)).join(" -> ")
    }
}

impl<'a, 't> TopologyFormatter<'a, 't> for Vec<NodeId> {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        self.as_slice().fmt(topo)
    }
}

impl<'a, 't> TopologyFormatter<'a, 't> for [Vec<NodeId>] {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        format!("({})", self.iter().map(|p| p.fmt(topo)).join("), ("))
    }
}

impl<'a, 't> TopologyFormatter<'a, 't> for Vec<Vec<NodeId>> {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        self.as_slice().fmt(topo)
    }
}

//
// Links
//
impl<'a, 't> TopologyFormatter<'a, 't> for (NodeId, NodeId) {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        format!("{} -> {}", self.0.fmt(topo), self.1.fmt(topo))
    }
}

//
// Set of nodes
//
impl<'a, 't> TopologyFormatter<'a, 't> for HashSet<NodeId> {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        format!("{{{}}}", self.iter().sorted().map(|n| n.fmt(topo)).join(", "))
    }
}

impl<'a, 't> TopologyFormatter<'a, 't> for BTreeSet<NodeId> {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        format!("{{{}}}", self.iter().map(|n| n.fmt(topo)).join(", "))
    }
}

impl<'a, 't> TopologyFormatter<'a, 't> for TopologyError {
    type Formatter = String;

    fn fmt(&'a self, topo: &'t Topology) -> Self::Formatter {
        match self {
            TopologyError::NodeNotFound(n) => format!("Node was not found in topology: {n:?}"),
            TopologyError::IsVictim(n) => format!("The node {} is the victim", n.fmt(topo)),
            TopologyError::VictimHasNextHop(n) => {
                format!("The victim {} has a downstream neighbor", n.fmt(topo))
            }
            TopologyError::NoNextHop(n) => {
                format!("Node {} has no path towards the victim", n.fmt(topo))
            }
            TopologyError::MultipleNextHops(n) => {
                format!("Node {} has multiple downstream neighbors", n.fmt(topo))
            }
            TopologyError::ForwardingLoop(p) => {
                format!("Forwarding loop occurred! path: {}", p.fmt(topo))
            }
            TopologyError::MultipleNormalUsers(u) => format!(
                "The topology has more than one normal user: {}",
                u.iter().map(|n| n.fmt(topo)).join(", ")
            ),
            TopologyError::SharedBranch {
                branch,
                first,
                second,
            } => format!(
                "Attackers {} and {} share the branch {}",
                first.fmt(topo),
                second.fmt(topo),
                branch.fmt(topo)
            ),
            e => e.to_string(),
        }
    }
}
