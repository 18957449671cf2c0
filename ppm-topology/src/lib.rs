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

//! # PPM-Topology
//!
//! This crate models the network over which probabilistic packet marking is simulated. A
//! [`Topology`] is a directed graph of named nodes, where every link points *towards the victim*.
//! Each node carries a [`types::Role`]: the victim, an intermediate router, the normal user, or an
//! attacker.
//!
//! The crate provides the operations that the traceback core requires from its topology:
//!
//! - Path lookup ([`Topology::path_to_victim`]) and enumeration of nodes and links.
//! - Validation ([`Topology::validate`] and [`Topology::is_valid`]), checking that the topology is
//!   a tree rooted at the victim, that there is exactly one normal user, and that every branch
//!   contains at most one attacker. The stricter size constraints of the original experiments are
//!   available as [`TreeConstraints`].
//! - A parser for plain-text topology files ([`TopologyParser`]).
//! - Builders for common topologies ([`Topology::line`] and [`Topology::branches`]) and random
//!   host placement ([`Topology::choose_hosts`], requires the feature `rand`).
//! - A formatter to print node ids using their names ([`formatter::TopologyFormatter`]).
//!
//! ```
//! use ppm_topology::prelude::*;
//!
//! # fn main() -> Result<(), TopologyError> {
//! let topo = Topology::line(3);
//! topo.validate()?;
//!
//! let attacker = topo.attackers()[0];
//! let path = topo.path_to_victim(attacker)?;
//! assert_eq!(path.fmt(&topo), "attacker -> R1 -> R2 -> R3 -> victim");
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
pub mod formatter;
mod parser;
pub mod prelude;
mod topology;
pub mod types;
mod validate;

pub use parser::TopologyParser;
pub use topology::Topology;
pub use validate::TreeConstraints;

#[cfg(test)]
mod test;
