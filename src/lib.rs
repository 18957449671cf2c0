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

//! # PPM-Traceback: Probabilistic packet marking for IP traceback
//!
//! This crate simulates probabilistic packet marking (PPM), a technique that allows the victim of
//! a denial-of-service attack to reconstruct the path of the attack traffic, even if the source
//! addresses of the packets are spoofed. Every router on the path of a packet overwrites a small
//! mark in the packet with some probability `p`. Since attackers send many packets, the victim
//! eventually collects enough marks to infer the path.
//!
//! Two sampling disciplines are implemented:
//!
//! - **Node sampling**: Each router writes its own identifier, and the number of hops since the
//!   mark was written is counted. The victim ranks the routers by how often they appear at each
//!   distance, and walks outward from the victim.
//! - **Edge sampling**: Each router writes the start of an edge, the next router writes its end,
//!   and the number of hops since the edge was written is counted. The victim builds an attack
//!   graph layer by layer, which can reveal multiple attackers at once.
//!
//! ## Structure
//! The source code of this program is structured as follows:
//! - The network topology is modelled in a separate crate: [`ppm_topology`].
//! - The module [`marking`] contains the router-side encoders ([`marking::NodeSampling`] and
//!   [`marking::EdgeSampling`]) behind the trait [`marking::MarkingScheme`].
//! - The module [`reconstruction`] contains the victim-side algorithms
//!   ([`reconstruction::rank_nodes`] and [`reconstruction::build_attack_graph`]).
//! - The module [`simulation`] sends packets through the topology ([`simulation::Simulation`]).
//! - The module [`analyzer`] runs many trials over a grid of parameters, and measures accuracy and
//!   convergence ([`analyzer::Analyzer`]).
//! - The module [`experiment`] exports results to json files (requires the feature `experiment`).
//!
//! ```
//! use ppm_traceback::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let topo = Topology::line(3);
//! let scheme = NodeSampling::new(0.5)?;
//! let mut collector = scheme.collector(topo.victim().unwrap());
//! for arrival in simulate(&topo, scheme, Traffic::new(1000), 1, 42)? {
//!     collector.observe(&arrival.mark);
//! }
//! let reconstruction = collector.reconstruct()?;
//! assert_eq!(
//!     reconstruction.path.fmt(&topo),
//!     "attacker -> R1 -> R2 -> R3 -> victim"
//! );
//! # Ok(())
//! # }
//! ```

#![deny(
    missing_docs,
    clippy::missing_docs_in_private_items,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod analyzer;
mod formatter;
pub mod marking;
pub mod prelude;
pub mod reconstruction;
pub mod simulation;
#[cfg(test)]
mod test;

pub use ppm_topology;
pub use ppm_topology::{prelude::NodeId, Topology};

#[cfg(feature = "experiment")]
#[cfg_attr(docsrs, doc(cfg(feature = "experiment")))]
/// Export an experiment result to a json file, including all metadata.
pub mod experiment {
    use std::{
        ffi::OsStr,
        fs::{remove_file, OpenOptions},
        io::Write,
        path::{Path, PathBuf},
    };

    use ppm_topology::Topology;
    use serde::Serialize;
    use thiserror::Error;
    use time::{format_description, OffsetDateTime};

    use crate::analyzer::AnalyzerConfig;

    /// Error while exporting an experiment.
    #[derive(Debug, Error)]
    pub enum ExperimentError {
        /// Cannot write the file.
        #[error("{0}")]
        Io(#[from] std::io::Error),
        /// Cannot serialize the experiment.
        #[error("{0}")]
        Json(#[from] serde_json::Error),
        /// Cannot format the current time.
        #[error("{0}")]
        Time(#[from] time::error::Format),
        /// Invalid format description for the timestamp.
        #[error("{0}")]
        TimeFormat(#[from] time::error::InvalidFormatDescription),
    }

    /// Structure to store an experiment result to file
    #[derive(Debug)]
    pub struct Experiment<'a, T> {
        /// Name of the topology
        pub name: &'a str,
        /// Topology on which the experiment was performed
        pub topo: &'a Topology,
        /// Configuration of the analyzer
        pub config: &'a AnalyzerConfig,
        /// Data obtained during the experiment.
        pub data: T,
    }

    impl<'a, T> Experiment<'a, T>
    where
        T: Serialize,
    {
        /// Write the json file adding to the filename `_DATE.json`. If the file already exists,
        /// append an increasing number to the filename. Returns the path of the written file.
        pub fn write_json_with_timestamp(
            &self,
            file: impl AsRef<str>,
        ) -> Result<PathBuf, ExperimentError> {
            let cur_time = OffsetDateTime::now_local()
                .unwrap_or_else(|_| OffsetDateTime::now_utc())
                .format(&format_description::parse(
                    "[year]-[month]-[day]_[hour]-[minute]-[second]",
                )?)?;
            let mut offset: Option<usize> = None;
            let file = loop {
                let filename = if let Some(offset) = offset {
                    format!("{}_{cur_time}_{}.json", file.as_ref(), offset)
                } else {
                    format!("{}_{cur_time}.json", file.as_ref())
                };
                let file = PathBuf::from(filename);
                if !file.exists() {
                    break file;
                }
                offset = Some(offset.unwrap_or_default() + 1);
            };

            self.write_json(&file)?;
            Ok(file)
        }

        /// Write the content of the experiment to a json file.
        ///
        /// This function will overwrite any existing file.
        pub fn write_json(&self, file: impl AsRef<OsStr>) -> Result<(), ExperimentError> {
            #[derive(Debug, Serialize)]
            #[allow(clippy::missing_docs_in_private_items)]
            struct ExportExperiment<'a, 'b, T> {
                name: &'a str,
                topo: &'a Topology,
                config: &'a AnalyzerConfig,
                data: &'b T,
            }

            let exp_str = serde_json::to_string_pretty(&ExportExperiment {
                name: self.name,
                topo: self.topo,
                config: self.config,
                data: &self.data,
            })?;

            let file = Path::new(file.as_ref());
            if file.exists() {
                remove_file(file)?;
            }
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).write(true).open(file)?;
            writeln!(file, "{exp_str}")?;
            Ok(())
        }
    }
}
