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

//! Module to evaluate the marking schemes over many independent trials.
//!
//! A single configuration is given by the [`Discipline`], the marking probability `p`, and the
//! number of packets `x` sent by each attacker per tick. For each configuration, the
//! [`Analyzer`] runs several trials, each with a fresh seed. During a trial, the victim
//! reconstructs the attack every `checkpoint` attack packets, and compares the reconstruction to
//! the ground truth.

use std::{borrow::Cow, fmt::Display};

use itertools::Itertools;
use log::{debug, info};
use ppm_topology::{
    prelude::{NodeId, TopologyError},
    Topology,
};
use rand::prelude::*;
use thiserror::Error;

use crate::{
    marking::{Discipline, EdgeSampling, MarkingError, MarkingScheme, NodeSampling},
    reconstruction::{Collector, Traceback, DEFAULT_SUPPORT},
    simulation::{SimError, Simulation},
};

/// Default number of packets each attacker sends in a trial.
pub const DEFAULT_BUDGET: usize = 5000;

/// How attackers and normal users are placed in the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Placement {
    /// Use the roles defined in the topology.
    #[default]
    Fixed,
    /// Randomly choose the given number of attackers (on distinct branches) and a single normal
    /// user for each trial. See [`Topology::choose_hosts`].
    Random {
        /// Number of attackers.
        attackers: usize,
    },
}

/// Configuration of the analyzer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AnalyzerConfig {
    /// Number of trials for each configuration.
    pub trials: usize,
    /// Number of ticks for each trial. If `None`, each trial runs until every attacker has sent
    /// `budget` packets (see [`AnalyzerConfig::ticks_for`]).
    pub ticks: Option<usize>,
    /// Number of packets each attacker sends in a trial, if `ticks` is `None`.
    pub budget: usize,
    /// Number of packets sent by the normal user in each tick.
    pub normal_rate: usize,
    /// Number of attack packets after which the victim reconstructs the attack.
    pub checkpoint: usize,
    /// Support threshold for the edge sampling reconstruction.
    pub support: f64,
    /// Seed from which the seeds of all trials are derived.
    pub seed: u64,
    /// Host placement.
    pub placement: Placement,
}

impl AnalyzerConfig {
    /// Number of ticks of a trial in which each attacker sends `x` packets per tick. Without a
    /// fixed number of ticks, this is `ceil(budget / x)`.
    pub fn ticks_for(&self, x: usize) -> usize {
        match self.ticks {
            Some(ticks) => ticks,
            None => self.budget.div_ceil(x.max(1)),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            trials: 50,
            ticks: None,
            budget: DEFAULT_BUDGET,
            normal_rate: 1,
            checkpoint: 1,
            support: DEFAULT_SUPPORT,
            seed: 0,
            placement: Placement::Fixed,
        }
    }
}

/// Error while analyzing the marking schemes.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The topology is not valid.
    #[error("Invalid topology: {0}")]
    Topology(#[from] TopologyError),
    /// The marking scheme cannot be created.
    #[error("{0}")]
    Marking(#[from] MarkingError),
    /// Error during the simulation.
    #[error("{0}")]
    Simulation(#[from] SimError),
    /// The configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Outcome of a single trial.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TrialOutcome {
    /// Number of attack packets sent, and whether the reconstruction was correct at that point.
    pub checkpoints: Vec<(usize, bool)>,
    /// Whether the final reconstruction is correct.
    pub correct: bool,
    /// Number of attack packets after which the reconstruction stayed correct. See
    /// [`convergence_point`].
    pub convergence: Option<usize>,
}

impl TrialOutcome {
    /// Create the outcome from its checkpoints.
    pub fn new(checkpoints: Vec<(usize, bool)>) -> Self {
        let correct = checkpoints.last().map(|(_, c)| *c).unwrap_or(false);
        let convergence = convergence_point(&checkpoints);
        Self {
            checkpoints,
            correct,
            convergence,
        }
    }
}

/// Compute the number of attack packets at the first checkpoint after which the reconstruction is
/// correct at every later checkpoint. Returns `None` if the reconstruction is wrong at the last
/// checkpoint.
///
/// ```
/// use ppm_traceback::analyzer::convergence_point;
///
/// let checkpoints = [(10, false), (20, true), (30, false), (40, true), (50, true)];
/// assert_eq!(convergence_point(&checkpoints), Some(40));
/// assert_eq!(convergence_point(&[(10, true), (20, false)]), None);
/// ```
pub fn convergence_point(checkpoints: &[(usize, bool)]) -> Option<usize> {
    let stable = checkpoints
        .iter()
        .rev()
        .take_while(|(_, correct)| *correct)
        .count();
    if stable == 0 {
        None
    } else {
        Some(checkpoints[checkpoints.len() - stable].0)
    }
}

/// Aggregated result for a single configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SweepPoint {
    /// Sampling discipline.
    pub discipline: Discipline,
    /// Marking probability.
    pub p: f64,
    /// Attack packets per attacker and tick.
    pub x: usize,
    /// Number of trials.
    pub trials: usize,
    /// Fraction of trials whose final reconstruction is correct.
    pub accuracy: f64,
    /// Number of trials that converged.
    pub converged: usize,
    /// Median number of attack packets needed to converge (only considering trials that
    /// converged).
    pub convergence: Option<usize>,
    /// Mean number of attack packets needed to converge (only considering trials that
    /// converged).
    pub mean_convergence: Option<f64>,
    /// Fraction of correct trials at each checkpoint.
    pub curve: Vec<(usize, f64)>,
}

impl SweepPoint {
    /// Aggregate the outcomes of all trials.
    pub fn aggregate(discipline: Discipline, p: f64, x: usize, outcomes: &[TrialOutcome]) -> Self {
        let trials = outcomes.len();
        let fraction = |k: usize| {
            if trials == 0 {
                0.0
            } else {
                k as f64 / trials as f64
            }
        };

        let accuracy = fraction(outcomes.iter().filter(|o| o.correct).count());
        let convergences: Vec<usize> = outcomes
            .iter()
            .filter_map(|o| o.convergence)
            .sorted()
            .collect();
        let converged = convergences.len();
        let convergence = (!convergences.is_empty()).then(|| convergences[(converged - 1) / 2]);
        let mean_convergence = (!convergences.is_empty())
            .then(|| convergences.iter().sum::<usize>() as f64 / converged as f64);

        let curve = match outcomes.first() {
            Some(first) => first
                .checkpoints
                .iter()
                .enumerate()
                .map(|(i, (n, _))| {
                    let correct = outcomes
                        .iter()
                        .filter(|o| o.checkpoints.get(i).map(|(_, c)| *c).unwrap_or(false))
                        .count();
                    (*n, fraction(correct))
                })
                .collect(),
            None => Vec::new(),
        };

        Self {
            discipline,
            p,
            x,
            trials,
            accuracy,
            converged,
            convergence,
            mean_convergence,
            curve,
        }
    }
}

/// Results of a sweep over multiple configurations.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SweepTable {
    /// All points in the order in which they were computed.
    pub points: Vec<SweepPoint>,
}

impl SweepTable {
    /// Get the point of a specific configuration.
    pub fn get(&self, discipline: Discipline, p: f64, x: usize) -> Option<&SweepPoint> {
        self.points
            .iter()
            .find(|pt| pt.discipline == discipline && pt.x == x && (pt.p - p).abs() < 1e-9)
    }

    /// Iterate over all points.
    pub fn iter(&self) -> std::slice::Iter<'_, SweepPoint> {
        self.points.iter()
    }

    /// Number of points in the table.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the table has no point.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Display for SweepTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:<10} {:>6} {:>8} {:>9} {:>10} {:>12}",
            "discipline", "p", "x", "accuracy", "converged", "convergence"
        )?;
        for pt in self.points.iter() {
            let convergence = pt
                .convergence
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "{:<10} {:>6.2} {:>8} {:>9.3} {:>10} {:>12}",
                pt.discipline,
                pt.p,
                pt.x,
                pt.accuracy,
                format!("{}/{}", pt.converged, pt.trials),
                convergence
            )?;
        }
        Ok(())
    }
}

/// Evaluates the marking schemes on a topology.
#[derive(Debug, Clone)]
pub struct Analyzer<'a> {
    /// The topology
    topo: &'a Topology,
    /// The configuration
    config: AnalyzerConfig,
}

impl<'a> Analyzer<'a> {
    /// Create a new analyzer. The configuration and the topology are checked. With
    /// [`Placement::Fixed`], the topology must be valid, including its hosts. With
    /// [`Placement::Random`], only the structure of the topology is checked.
    pub fn new(topo: &'a Topology, config: AnalyzerConfig) -> Result<Self, AnalyzerError> {
        if config.trials == 0 {
            return Err(AnalyzerError::InvalidConfig("trials must be positive".into()));
        }
        if config.ticks == Some(0) {
            return Err(AnalyzerError::InvalidConfig("ticks must be positive".into()));
        }
        if config.ticks.is_none() && config.budget == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "packet budget must be positive".into(),
            ));
        }
        if config.checkpoint == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "checkpoint must be positive".into(),
            ));
        }
        // reject invalid support values early
        EdgeSampling::new(1.0)?.with_support(config.support)?;

        match config.placement {
            Placement::Fixed => topo.validate()?,
            Placement::Random { attackers } => {
                topo.validate_structure()?;
                if attackers == 0 {
                    return Err(AnalyzerError::InvalidConfig(
                        "at least one attacker is required".into(),
                    ));
                }
                let num_branches = topo.victim_branches().len();
                if num_branches < attackers {
                    return Err(TopologyError::NotEnoughBranches {
                        requested: attackers,
                        available: num_branches,
                    }
                    .into());
                }
            }
        }

        Ok(Self { topo, config })
    }

    /// The configuration of the analyzer.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Run all trials of a single configuration. The seeds of the trials are drawn from a
    /// generator seeded with the configured seed, so every configuration uses the same sequence of
    /// trial seeds.
    pub fn run_point(
        &self,
        discipline: Discipline,
        p: f64,
        x: usize,
    ) -> Result<SweepPoint, AnalyzerError> {
        match discipline {
            Discipline::Node => self.run_point_with(discipline, NodeSampling::new(p)?, x),
            Discipline::Edge => self.run_point_with(
                discipline,
                EdgeSampling::new(p)?.with_support(self.config.support)?,
                x,
            ),
        }
    }

    /// Run all trials of a single configuration using the given marking scheme.
    fn run_point_with<M: MarkingScheme + Clone>(
        &self,
        discipline: Discipline,
        scheme: M,
        x: usize,
    ) -> Result<SweepPoint, AnalyzerError> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let outcomes = (0..self.config.trials)
            .map(|_| self.run_trial(scheme.clone(), x, rng.gen()))
            .collect::<Result<Vec<_>, _>>()?;
        let point = SweepPoint::aggregate(discipline, scheme.probability(), x, &outcomes);
        info!(
            "{discipline} sampling, p = {}, x = {x}: accuracy = {:.3}, convergence = {:?}",
            point.p, point.accuracy, point.convergence
        );
        Ok(point)
    }

    /// Run a single trial with the given seed. Each attacker sends `x` packets per tick.
    pub fn run_trial<M: MarkingScheme>(
        &self,
        scheme: M,
        x: usize,
        seed: u64,
    ) -> Result<TrialOutcome, AnalyzerError> {
        if x == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "attackers must send at least one packet".into(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let topo: Cow<'_, Topology> = match self.config.placement {
            Placement::Fixed => Cow::Borrowed(self.topo),
            Placement::Random { attackers } => {
                Cow::Owned(self.topo.choose_hosts(&mut rng, attackers, 1)?)
            }
        };
        let truth: Vec<Vec<NodeId>> = topo
            .attackers()
            .into_iter()
            .map(|a| topo.path_to_victim(a))
            .collect::<Result<_, _>>()?;

        let sim_rng = StdRng::seed_from_u64(rng.gen());
        let mut sim = Simulation::with_rng(&topo, scheme, sim_rng)?;
        let mut collector = sim.scheme().collector_for(&topo)?;
        let normal_users = sim.normal_users().to_vec();
        let attackers = sim.attackers().to_vec();

        let score = |collector: &<M as MarkingScheme>::Collector| {
            collector
                .reconstruct()
                .map(|r| r.matches(&truth))
                .unwrap_or(false)
        };

        let mut checkpoints = Vec::new();
        let mut sent = 0;
        for _ in 0..self.config.ticks_for(x) {
            for user in normal_users.iter() {
                for _ in 0..self.config.normal_rate {
                    collector.observe(&sim.send(*user)?.mark);
                }
            }
            for attacker in attackers.iter() {
                for _ in 0..x {
                    collector.observe(&sim.send(*attacker)?.mark);
                    sent += 1;
                    if sent % self.config.checkpoint == 0 {
                        checkpoints.push((sent, score(&collector)));
                    }
                }
            }
        }
        if checkpoints.last().map(|(n, _)| *n) != Some(sent) {
            checkpoints.push((sent, score(&collector)));
        }

        let outcome = TrialOutcome::new(checkpoints);
        debug!(
            "trial {seed}: correct = {}, convergence = {:?}",
            outcome.correct, outcome.convergence
        );
        Ok(outcome)
    }

    /// Evaluate all combinations of `disciplines`, `ps`, and `xs`. The points are ordered by
    /// discipline, then by `x`, and then by `p`.
    pub fn sweep(
        &self,
        disciplines: &[Discipline],
        ps: &[f64],
        xs: &[usize],
    ) -> Result<SweepTable, AnalyzerError> {
        let mut points = Vec::with_capacity(disciplines.len() * ps.len() * xs.len());
        for discipline in disciplines {
            for x in xs {
                for p in ps {
                    points.push(self.run_point(*discipline, *p, *x)?);
                }
            }
        }
        Ok(SweepTable { points })
    }
}
