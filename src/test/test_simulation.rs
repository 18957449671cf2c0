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

use crate::prelude::*;

#[test]
fn arrivals_per_tick() {
    let topo = Topology::line(3);
    let attacker = topo.node_id("attacker").unwrap();
    let user = topo.node_id("user").unwrap();
    let r3 = topo.node_id("R3").unwrap();

    let scheme = NodeSampling::new(0.5).unwrap();
    let arrivals = simulate(&topo, scheme, Traffic::new(10), 3, 0).unwrap();
    assert_eq!(arrivals.len(), 33);
    // the normal user sends first in each tick
    assert_eq!(arrivals[0].source, user);
    assert_eq!(arrivals[0].branch, user);
    assert!(arrivals[1..11].iter().all(|a| a.source == attacker));
    assert!(arrivals[1..11].iter().all(|a| a.branch == r3));
    assert_eq!(arrivals[11].source, user);

    let traffic = Traffic {
        attacker_packets: 2,
        normal_packets: 0,
    };
    let arrivals = simulate(&topo, scheme, traffic, 4, 0).unwrap();
    assert_eq!(arrivals.len(), 8);
}

#[test]
fn node_distance_invariant() {
    let topo = Topology::line(4);
    let attacker = topo.node_id("attacker").unwrap();
    let path = topo.path_to_victim(attacker).unwrap();

    let scheme = NodeSampling::new(0.3).unwrap();
    let arrivals = simulate(&topo, scheme, Traffic::new(500), 1, 1).unwrap();
    let mut marked = 0;
    for arrival in arrivals.iter().filter(|a| a.source == attacker) {
        let mark = arrival.mark;
        if let Some(node) = mark.node {
            let idx = path.iter().position(|n| *n == node).unwrap();
            assert_eq!(mark.distance, path.len() - 2 - idx);
            marked += 1;
        } else {
            assert_eq!(mark.distance, path.len() - 1);
        }
    }
    assert!(marked > 0);
}

#[test]
fn edge_adjacency_invariant() {
    let topo = Topology::line(4);
    let scheme = EdgeSampling::new(0.3).unwrap();
    let arrivals = simulate(&topo, scheme, Traffic::new(500), 1, 2).unwrap();
    let mut fixed = 0;
    for arrival in arrivals {
        if let Some((start, end)) = arrival.mark.edge() {
            assert!(topo.edge_between(start, end).is_some());
            assert_eq!(topo.hop_distance(end).unwrap(), arrival.mark.distance);
            fixed += 1;
        }
    }
    assert!(fixed > 0);
}

#[test]
fn deterministic() {
    let topo = Topology::line(3);
    let scheme = EdgeSampling::new(0.4).unwrap();
    let a = simulate(&topo, scheme, Traffic::new(100), 2, 7).unwrap();
    let b = simulate(&topo, scheme, Traffic::new(100), 2, 7).unwrap();
    let c = simulate(&topo, scheme, Traffic::new(100), 2, 8).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);

    let mut sim = Simulation::new(&topo, scheme, 7).unwrap();
    let run = sim.run(&Traffic::new(100), 2);
    assert_eq!(a, run);
}

#[test]
fn single_hop_marked_with_p() {
    let topo = Topology::line(0);
    let attacker = topo.node_id("attacker").unwrap();
    let n = 10_000;
    let mut sim = Simulation::new(&topo, NodeSampling::new(0.3).unwrap(), 3).unwrap();
    let mut marked = 0;
    for _ in 0..n {
        let arrival = sim.send(attacker).unwrap();
        if arrival.mark.node == Some(attacker) {
            assert_eq!(arrival.mark.distance, 0);
            marked += 1;
        }
    }
    assert_abs_diff_eq!(marked as f64 / n as f64, 0.3, epsilon = 0.03);
}

#[test]
fn single_hop_recovered() {
    let topo = Topology::line(0);
    let attacker = topo.node_id("attacker").unwrap();
    let victim = topo.victim().unwrap();

    let scheme = NodeSampling::new(1.0).unwrap();
    let mut sim = Simulation::new(&topo, scheme, 0).unwrap();
    let mut collector = scheme.collector(victim);
    collector.observe(&sim.send(attacker).unwrap().mark);
    assert_eq!(collector.reconstruct().unwrap().path, vec![attacker, victim]);

    let scheme = EdgeSampling::new(1.0).unwrap();
    let mut sim = Simulation::new(&topo, scheme, 0).unwrap();
    let mut collector = scheme.collector(victim);
    collector.observe(&sim.send(attacker).unwrap().mark);
    let graph = collector.reconstruct().unwrap();
    assert_eq!(graph.paths(), vec![vec![attacker, victim]]);
}

#[test]
fn always_mark_reveals_last_hop() {
    let topo = Topology::line(3);
    let attacker = topo.node_id("attacker").unwrap();
    let r3 = topo.node_id("R3").unwrap();
    let victim = topo.victim().unwrap();

    let scheme = NodeSampling::new(1.0).unwrap();
    let mut sim = Simulation::new(&topo, scheme, 0).unwrap();
    let mark = sim.send(attacker).unwrap().mark;
    assert_eq!(
        mark,
        NodeMark {
            node: Some(r3),
            distance: 0
        }
    );
    let mut collector = scheme.collector(victim);
    collector.observe(&mark);
    let rec = collector.reconstruct().unwrap();
    assert_eq!(rec.path, vec![r3, victim]);
    assert_eq!(rec.victim_adjacent(), r3);

    let scheme = EdgeSampling::new(1.0).unwrap();
    let mut sim = Simulation::new(&topo, scheme, 0).unwrap();
    let arrival = sim.send(attacker).unwrap();
    assert_eq!(arrival.mark.edge(), Some((r3, victim)));
    assert_eq!(arrival.fmt(&topo), "attacker via R3: (R3 -> victim, d=0)");
}

#[test]
fn top_node_line() {
    let topo = Topology::line(3);
    let attacker = topo.node_id("attacker").unwrap();
    let r2 = topo.node_id("R2").unwrap();
    let r3 = topo.node_id("R3").unwrap();
    let victim = topo.victim().unwrap();

    let scheme = NodeSampling::new(0.5).unwrap();
    let mut collector = scheme.collector(victim);
    for arrival in simulate(&topo, scheme, Traffic::new(1000), 1, 42).unwrap() {
        collector.observe(&arrival.mark);
    }
    let ranking = collector.ranking();
    let (top, count) = ranking.top(0).unwrap();
    assert_eq!(top, r3);
    assert!((400..=600).contains(&count));
    assert_eq!(ranking.top(1).map(|(n, _)| n), Some(r2));

    let rec = collector.reconstruct().unwrap();
    assert_eq!(rec.path, topo.path_to_victim(attacker).unwrap());
}

#[test]
fn two_attackers_edge_sampling() {
    let mut topo = Topology::branches(&[3, 2, 1]);
    let n = |topo: &Topology, name: &str| topo.node_id(name).unwrap();
    let (v, b1, a1, b2, a2, u) = (
        n(&topo, "0"),
        n(&topo, "1"),
        n(&topo, "3"),
        n(&topo, "4"),
        n(&topo, "5"),
        n(&topo, "6"),
    );
    topo.set_role(a1, Role::Attacker).unwrap();
    topo.set_role(a2, Role::Attacker).unwrap();
    topo.set_role(u, Role::NormalUser).unwrap();

    let scheme = EdgeSampling::new(0.3).unwrap();
    let mut collector = scheme.collector(v);
    for arrival in simulate(&topo, scheme, Traffic::new(2000), 1, 5).unwrap() {
        collector.observe(&arrival.mark);
    }
    let graph = collector.reconstruct().unwrap();
    assert_eq!(graph.root_edges(), vec![(b1, v), (b2, v)]);
    assert_eq!(graph.origins(), vec![a1, a2]);

    let truth = vec![
        topo.path_to_victim(a1).unwrap(),
        topo.path_to_victim(a2).unwrap(),
    ];
    assert!(graph.matches(&truth));
}

#[test]
fn invalid_topology() {
    // no hosts
    let topo = Topology::branches(&[2, 2]);
    assert!(matches!(
        Simulation::new(&topo, NodeSampling::new(0.5).unwrap(), 0),
        Err(SimError::Topology(_))
    ));

    // two attackers on the same branch
    let mut topo = Topology::line(2);
    let r1 = topo.node_id("R1").unwrap();
    topo.set_role(r1, Role::Attacker).unwrap();
    assert!(matches!(
        simulate(&topo, EdgeSampling::new(0.5).unwrap(), Traffic::new(1), 1, 0),
        Err(SimError::Topology(TopologyError::SharedBranch { .. }))
    ));
}

#[test]
fn send_from_router() {
    let topo = Topology::line(3);
    let r1 = topo.node_id("R1").unwrap();
    let mut sim = Simulation::new(&topo, NodeSampling::new(0.5).unwrap(), 0).unwrap();
    assert!(matches!(sim.send(r1), Err(SimError::NotASource(x)) if x == r1));
}
