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

//! Module for reading topology files.
//!
//! A topology file is a plain text file with one statement per line. Empty lines and everything
//! after a `#` are ignored. The following statements are supported:
//!
//! - `<parent> <child>`: A link between two nodes, where `parent` is the node closer to the
//!   victim. Packets of `child` are forwarded to `parent`.
//! - `victim <name>`: Designate the victim. If no victim is given, the node named `0` is the
//!   victim.
//! - `attacker <name>`: Designate an attacker.
//! - `normal <name>`: Designate the normal user.
//!
//! Role statements take precedence, so nodes cannot be called `victim`, `attacker`, or `normal`.
//!
//! ```
//! use ppm_topology::prelude::*;
//!
//! # fn main() -> Result<(), TopologyError> {
//! let topo = TopologyParser::new(
//!     "# two branches
//!      0 1
//!      1 2
//!      0 3
//!      attacker 2
//!      normal 3",
//! )?
//! .get_topology()?;
//!
//! assert!(topo.is_valid());
//! assert_eq!(topo.victim(), Some(topo.node_id("0")?));
//! # Ok(())
//! # }
//! ```

use std::{collections::HashMap, path::Path, str::FromStr};

use log::debug;

use crate::{
    types::{NodeId, Role, TopologyError},
    Topology,
};

/// Name of the victim if the file does not contain a `victim` statement.
const DEFAULT_VICTIM: &str = "0";

/// Structure to read a topology file.
#[derive(Debug, Clone, Default)]
pub struct TopologyParser {
    links: Vec<(String, String)>,
    victim: Option<String>,
    roles: Vec<(usize, String, Role)>,
}

impl TopologyParser {
    /// Interpret the content of a topology file.
    pub fn new(content: &str) -> Result<Self, TopologyError> {
        let mut this = Self::default();

        for (idx, line) in content.lines().enumerate() {
            let line_nr = idx + 1;
            let line = match line.split_once('#') {
                Some((l, _)) => l,
                None => line,
            };
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                [] => {}
                ["victim", name] => {
                    if this.victim.is_some() {
                        return Err(TopologyError::Parse {
                            line: line_nr,
                            reason: "The victim is defined multiple times".to_string(),
                        });
                    }
                    this.victim = Some(name.to_string());
                }
                ["attacker", name] => this.roles.push((line_nr, name.to_string(), Role::Attacker)),
                ["normal", name] => this.roles.push((line_nr, name.to_string(), Role::NormalUser)),
                [parent, child] => {
                    if parent == child {
                        return Err(TopologyError::Parse {
                            line: line_nr,
                            reason: format!("Link from {parent} to itself"),
                        });
                    }
                    this.links.push((parent.to_string(), child.to_string()))
                }
                _ => {
                    return Err(TopologyError::Parse {
                        line: line_nr,
                        reason: format!("Expected two tokens, found {}", tokens.len()),
                    })
                }
            }
        }

        Ok(this)
    }

    /// Read and interpret a topology file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        debug!("Read topology file {}", path.as_ref().display());
        Self::new(&content)
    }

    /// Create the topology, adding all nodes in the order in which they first appear, all links,
    /// and all roles. If the victim is not defined explicitly, the node `0` becomes the victim (if
    /// it exists). The topology is not validated.
    pub fn get_topology(&self) -> Result<Topology, TopologyError> {
        let mut topo = Topology::new();
        let mut lut: HashMap<&str, NodeId> = HashMap::new();

        for (parent, child) in self.links.iter() {
            let parent = *lut
                .entry(parent.as_str())
                .or_insert_with(|| topo.add_node(parent.clone()));
            let child = *lut
                .entry(child.as_str())
                .or_insert_with(|| topo.add_node(child.clone()));
            topo.add_link(child, parent)?;
        }

        match self.victim.as_deref() {
            Some(victim) => {
                let id = *lut
                    .get(victim)
                    .ok_or_else(|| TopologyError::NodeNameNotFound(victim.to_string()))?;
                topo.set_victim(id)?;
            }
            None => {
                if let Some(id) = lut.get(DEFAULT_VICTIM) {
                    topo.set_victim(*id)?;
                }
            }
        }

        for (line, name, role) in self.roles.iter() {
            let id = *lut.get(name.as_str()).ok_or_else(|| TopologyError::Parse {
                line: *line,
                reason: format!("Unknown node {name}"),
            })?;
            if topo.victim() == Some(id) {
                return Err(TopologyError::Parse {
                    line: *line,
                    reason: format!("The victim {name} cannot be a {role}"),
                });
            }
            topo.set_role(id, *role)?;
        }

        Ok(topo)
    }
}

impl FromStr for Topology {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TopologyParser::new(s)?.get_topology()
    }
}

impl Topology {
    /// Read the topology from a file. See [`TopologyParser`] for the format.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        TopologyParser::from_file(path)?.get_topology()
    }
}
