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

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use ppm_traceback::{
    analyzer::{Analyzer, AnalyzerConfig, Placement, DEFAULT_BUDGET},
    experiment::Experiment,
    marking::Discipline,
    ppm_topology::{formatter::TopologyFormatter, Topology, TreeConstraints},
    reconstruction::DEFAULT_SUPPORT,
};

/// Evaluate node sampling and edge sampling over a grid of marking probabilities and attack rates.
#[derive(Debug, Parser)]
struct Cli {
    /// Topology files to evaluate. Each line of a file is either a link `<parent> <child>`, or a
    /// role `victim <name>`, `attacker <name>`, or `normal <name>`.
    topologies: Vec<PathBuf>,
    /// Evaluate a line topology with the given number of routers.
    #[clap(short, long)]
    line: Option<usize>,
    /// Sampling discipline to evaluate
    #[clap(short, long, default_value = "all")]
    discipline: DisciplineIter,
    /// Marking probabilities to evaluate
    #[clap(
        short,
        long = "prob",
        value_delimiter = ',',
        default_values_t = [0.2, 0.4, 0.5, 0.6, 0.8]
    )]
    p: Vec<f64>,
    /// Number of packets sent by each attacker per tick
    #[clap(
        short,
        long = "rate",
        value_delimiter = ',',
        default_values_t = [10, 100, 1000]
    )]
    x: Vec<usize>,
    /// Number of trials for each configuration
    #[clap(short = 'n', long, default_value = "50")]
    trials: usize,
    /// Number of ticks in each trial. If omitted, each trial runs until every attacker has sent
    /// `--budget` packets.
    #[clap(short = 'T', long)]
    ticks: Option<usize>,
    /// Number of packets each attacker sends in a trial (ignored if `--ticks` is given)
    #[clap(short, long, default_value_t = DEFAULT_BUDGET)]
    budget: usize,
    /// Reconstruct the attack after this many attack packets
    #[clap(short, long, default_value = "1")]
    checkpoint: usize,
    /// Support threshold for the edge sampling reconstruction
    #[clap(long, default_value_t = DEFAULT_SUPPORT)]
    support: f64,
    /// Seed for all random decisions
    #[clap(short, long, default_value = "0")]
    seed: u64,
    /// Randomly place this many attackers (and one normal user) on the leaves in each trial,
    /// ignoring the roles defined in the topology.
    #[clap(short, long)]
    attackers: Option<usize>,
    /// Require the topologies to satisfy the default tree constraints (number of routers,
    /// branches, and depth).
    #[clap(long)]
    strict: bool,
    /// Output directory, where to store the generated JSON. The generated files will have the
    /// following filenames: `{OUTPUT}/{TOPO}_{TIME}.json`
    #[clap(short, long)]
    output: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();

    let mut topos: Vec<(String, Topology)> = Vec::new();
    if let Some(n) = args.line {
        topos.push((format!("line_{n}"), Topology::line(n)));
    }
    for path in args.topologies.iter() {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "topology".to_string());
        topos.push((name, Topology::from_file(path)?));
    }
    if topos.is_empty() {
        return Err("No topology given! Pass a topology file or use `--line`.".into());
    }

    let disciplines: Vec<Discipline> = args.discipline.into_iter().collect();
    let placement = match args.attackers {
        Some(attackers) => Placement::Random { attackers },
        None => Placement::Fixed,
    };
    let config = AnalyzerConfig {
        trials: args.trials,
        ticks: args.ticks,
        budget: args.budget,
        normal_rate: 1,
        checkpoint: args.checkpoint,
        support: args.support,
        seed: args.seed,
        placement,
    };

    for (name, topo) in topos.iter() {
        if args.strict {
            if let Err(e) = TreeConstraints::default().check(topo) {
                log::error!("Topology {name} violates the constraints: {}", e.fmt(topo));
                return Err(e.into());
            }
        }

        let analyzer = match Analyzer::new(topo, config.clone()) {
            Ok(a) => a,
            Err(e) => {
                log::error!("Cannot analyze topology {name}: {e}");
                return Err(e.into());
            }
        };
        let table = analyzer.sweep(&disciplines, &args.p, &args.x)?;

        println!("topology {name}:\n{table}");

        if let Some(output) = args.output.as_ref() {
            let file = Experiment {
                name,
                topo,
                config: &config,
                data: &table,
            }
            .write_json_with_timestamp(format!("{output}/{name}"))?;
            log::info!("Results written to {}", file.display());
        }
    }

    Ok(())
}

/// Which sampling disciplines to evaluate?
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, ValueEnum)]
enum DisciplineIter {
    /// Node sampling
    Node,
    /// Edge sampling
    Edge,
    /// Evaluate both disciplines
    All,
}

impl IntoIterator for DisciplineIter {
    type Item = Discipline;
    type IntoIter = std::vec::IntoIter<Discipline>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            DisciplineIter::Node => vec![Discipline::Node],
            DisciplineIter::Edge => vec![Discipline::Edge],
            DisciplineIter::All => vec![Discipline::Node, Discipline::Edge],
        }
        .into_iter()
    }
}
