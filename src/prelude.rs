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

//! This module re-exports the most commonly used types and traits.

pub use ppm_topology::prelude::*;

pub use crate::analyzer::{
    Analyzer, AnalyzerConfig, AnalyzerError, Placement, SweepPoint, SweepTable,
};
pub use crate::marking::{
    Discipline, EdgeMark, EdgeSampling, MarkingError, MarkingScheme, NodeMark, NodeSampling,
};
pub use crate::reconstruction::{
    build_attack_graph, rank_nodes, AttackGraph, Collector, ReconstructionError, Traceback,
};
pub use crate::simulation::{simulate, Arrival, SimError, Simulation, Traffic};
