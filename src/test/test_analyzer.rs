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

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use test_log::test;

use crate::{analyzer::*, prelude::*};

#[test]
fn convergence() {
    assert_eq!(convergence_point(&[]), None);
    assert_eq!(convergence_point(&[(1, false), (2, false)]), None);
    assert_eq!(convergence_point(&[(1, true), (2, true)]), Some(1));
    assert_eq!(
        convergence_point(&[(1, true), (2, false), (3, true), (4, true)]),
        Some(3)
    );
    assert_eq!(convergence_point(&[(1, true), (2, true), (3, false)]), None);
}

#[test]
fn aggregate() {
    let outcomes = vec![
        TrialOutcome::new(vec![(10, false), (20, true), (30, true)]),
        TrialOutcome::new(vec![(10, true), (20, true), (30, true)]),
        TrialOutcome::new(vec![(10, false), (20, false), (30, true)]),
        TrialOutcome::new(vec![(10, true), (20, true), (30, false)]),
    ];
    assert_eq!(outcomes[0].convergence, Some(20));
    assert!(!outcomes[3].correct);

    let point = SweepPoint::aggregate(Discipline::Node, 0.5, 30, &outcomes);
    assert_eq!(point.trials, 4);
    assert_eq!(point.converged, 3);
    assert_abs_diff_eq!(point.accuracy, 0.75);
    // lower median of [10, 20, 30]
    assert_eq!(point.convergence, Some(20));
    assert_abs_diff_eq!(point.mean_convergence.unwrap(), 20.0);
    assert_eq!(point.curve, vec![(10, 0.5), (20, 0.75), (30, 0.75)]);

    let empty = SweepPoint::aggregate(Discipline::Edge, 0.5, 30, &[]);
    assert_eq!(empty.convergence, None);
    assert_eq!(empty.accuracy, 0.0);
}

/// Configuration with a single tick per trial.
fn config(trials: usize, checkpoint: usize) -> AnalyzerConfig {
    AnalyzerConfig {
        trials,
        checkpoint,
        ticks: Some(1),
        ..Default::default()
    }
}

#[test]
fn invalid_config() {
    let topo = Topology::line(3);
    assert!(matches!(
        Analyzer::new(&topo, config(0, 1)),
        Err(AnalyzerError::InvalidConfig(_))
    ));
    assert!(matches!(
        Analyzer::new(&topo, config(1, 0)),
        Err(AnalyzerError::InvalidConfig(_))
    ));
    assert!(matches!(
        Analyzer::new(
            &topo,
            AnalyzerConfig {
                support: 0.0,
                ..Default::default()
            }
        ),
        Err(AnalyzerError::Marking(MarkingError::InvalidSupport(_)))
    ));

    assert!(matches!(
        Analyzer::new(
            &topo,
            AnalyzerConfig {
                ticks: Some(0),
                ..Default::default()
            }
        ),
        Err(AnalyzerError::InvalidConfig(_))
    ));
    assert!(matches!(
        Analyzer::new(
            &topo,
            AnalyzerConfig {
                budget: 0,
                ..Default::default()
            }
        ),
        Err(AnalyzerError::InvalidConfig(_))
    ));

    let analyzer = Analyzer::new(&topo, config(1, 1)).unwrap();
    assert!(matches!(
        analyzer.run_point(Discipline::Node, 0.0, 10),
        Err(AnalyzerError::Marking(MarkingError::InvalidProbability(_)))
    ));
    assert!(matches!(
        analyzer.run_point(Discipline::Edge, 0.5, 0),
        Err(AnalyzerError::InvalidConfig(_))
    ));
}

#[test]
fn invalid_topology() {
    // no hosts
    let topo = Topology::branches(&[2, 2]);
    assert!(matches!(
        Analyzer::new(&topo, config(1, 1)),
        Err(AnalyzerError::Topology(TopologyError::NoNormalUser))
    ));

    // random placement only requires a tree
    let random = AnalyzerConfig {
        placement: Placement::Random { attackers: 2 },
        ..config(1, 1)
    };
    assert!(Analyzer::new(&topo, random).is_ok());

    let random = AnalyzerConfig {
        placement: Placement::Random { attackers: 3 },
        ..config(1, 1)
    };
    assert!(matches!(
        Analyzer::new(&topo, random),
        Err(AnalyzerError::Topology(TopologyError::NotEnoughBranches {
            requested: 3,
            available: 2
        }))
    ));
}

#[test]
fn trial_checkpoints() {
    let topo = Topology::line(3);
    let analyzer = Analyzer::new(
        &topo,
        AnalyzerConfig {
            ticks: Some(2),
            ..config(1, 30)
        },
    )
    .unwrap();
    let outcome = analyzer
        .run_trial(NodeSampling::new(0.5).unwrap(), 50, 0)
        .unwrap();
    let counts: Vec<usize> = outcome.checkpoints.iter().map(|(n, _)| *n).collect();
    assert_eq!(counts, vec![30, 60, 90, 100]);
}

#[test]
fn ticks_from_budget() {
    let config = AnalyzerConfig::default();
    assert_eq!(config.ticks, None);
    assert_eq!(config.budget, DEFAULT_BUDGET);
    assert_eq!(config.ticks_for(10), 500);
    assert_eq!(config.ticks_for(3000), 2);
    assert_eq!(config.ticks_for(5000), 1);
    assert_eq!(config.ticks_for(10000), 1);

    let fixed = AnalyzerConfig {
        ticks: Some(3),
        ..Default::default()
    };
    assert_eq!(fixed.ticks_for(10), 3);
    assert_eq!(fixed.ticks_for(10000), 3);
}

#[test]
fn trial_runs_until_budget() {
    let topo = Topology::line(3);
    let analyzer = Analyzer::new(
        &topo,
        AnalyzerConfig {
            budget: 100,
            ..AnalyzerConfig::default()
        },
    )
    .unwrap();
    let outcome = analyzer
        .run_trial(EdgeSampling::new(0.5).unwrap(), 30, 0)
        .unwrap();
    assert_eq!(outcome.checkpoints.len(), 120);
    assert_eq!(outcome.checkpoints.last().map(|(n, _)| *n), Some(120));

    let analyzer = Analyzer::new(
        &topo,
        AnalyzerConfig {
            budget: 100,
            checkpoint: 50,
            ..AnalyzerConfig::default()
        },
    )
    .unwrap();
    let outcome = analyzer
        .run_trial(NodeSampling::new(0.5).unwrap(), 30, 0)
        .unwrap();
    let counts: Vec<usize> = outcome.checkpoints.iter().map(|(n, _)| *n).collect();
    assert_eq!(counts, vec![50, 100, 120]);
}

#[test]
fn node_ignores_deeper_normal_user() {
    // one branch is twice as deep as the other, so the normal user often sits deeper than the
    // attacker.
    let topo = Topology::branches(&[3, 6]);
    let analyzer = Analyzer::new(
        &topo,
        AnalyzerConfig {
            trials: 20,
            checkpoint: DEFAULT_BUDGET,
            placement: Placement::Random { attackers: 1 },
            ..Default::default()
        },
    )
    .unwrap();
    let point = analyzer.run_point(Discipline::Node, 0.5, 10).unwrap();
    assert!(point.accuracy >= 0.9, "accuracy: {}", point.accuracy);
    assert_eq!(point.curve.last().map(|(n, _)| *n), Some(DEFAULT_BUDGET));
}

#[test]
fn more_packets_more_accurate() {
    let topo = Topology::line(3);
    let analyzer = Analyzer::new(&topo, config(100, 10)).unwrap();
    let few = analyzer.run_point(Discipline::Node, 0.5, 10).unwrap();
    let many = analyzer.run_point(Discipline::Node, 0.5, 1000).unwrap();
    assert!(many.accuracy > few.accuracy);
    assert!(many.accuracy > 0.9);
    assert!(many.converged >= few.converged);
}

#[test]
fn sweep() {
    let topo = Topology::line(3);
    let analyzer = Analyzer::new(&topo, config(50, 50)).unwrap();
    let table = analyzer
        .sweep(
            &[Discipline::Node, Discipline::Edge],
            &[0.5],
            &[10, 100, 1000],
        )
        .unwrap();
    assert_eq!(table.len(), 6);
    assert_eq!(table.points[0].discipline, Discipline::Node);
    assert_eq!(table.points[3].discipline, Discipline::Edge);
    assert_eq!(
        table.iter().map(|p| p.x).collect::<Vec<_>>(),
        vec![10, 100, 1000, 10, 100, 1000]
    );

    for discipline in [Discipline::Node, Discipline::Edge] {
        let acc: Vec<f64> = [10, 100, 1000]
            .into_iter()
            .map(|x| table.get(discipline, 0.5, x).unwrap().accuracy)
            .collect();
        assert!(acc[0] <= acc[1], "{discipline}: {acc:?}");
        assert!(acc[1] <= acc[2], "{discipline}: {acc:?}");
        assert!(acc[2] > 0.9, "{discipline}: {acc:?}");
    }
    assert!(table.get(Discipline::Node, 0.4, 10).is_none());

    let rendered = table.to_string();
    assert_eq!(rendered.lines().count(), 7);
    assert!(rendered.starts_with("discipline"));
}

#[test]
fn deterministic() {
    let topo = Topology::line(2);
    let analyzer = Analyzer::new(&topo, config(20, 5)).unwrap();
    let a = analyzer.run_point(Discipline::Edge, 0.4, 20).unwrap();
    let b = analyzer.run_point(Discipline::Edge, 0.4, 20).unwrap();
    assert_eq!(a, b);
}

#[test]
fn random_placement_two_attackers() {
    let topo = Topology::branches(&[3, 2, 2, 1]);
    let analyzer = Analyzer::new(
        &topo,
        AnalyzerConfig {
            placement: Placement::Random { attackers: 2 },
            ..config(10, 2000)
        },
    )
    .unwrap();
    let point = analyzer.run_point(Discipline::Edge, 0.3, 2000).unwrap();
    assert!(point.accuracy >= 0.8, "accuracy: {}", point.accuracy);
}
