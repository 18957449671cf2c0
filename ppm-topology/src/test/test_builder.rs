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

use std::collections::HashSet;

use maplit::hashset;
use pretty_assertions::assert_eq;
use rand::prelude::*;

use crate::{formatter::TopologyFormatter, types::*, Topology};

#[test]
fn line() {
    let topo = Topology::line(3);
    topo.validate().unwrap();
    let a = topo.attackers()[0];
    let u = topo.normal_users()[0];
    assert_eq!(
        topo.path_to_victim(a).unwrap().fmt(&topo),
        "attacker -> R1 -> R2 -> R3 -> victim"
    );
    assert_eq!(topo.path_to_victim(u).unwrap().fmt(&topo), "user -> victim");

    let topo = Topology::line(0);
    let a = topo.attackers()[0];
    assert_eq!(topo.path_to_victim(a).unwrap().fmt(&topo), "attacker -> victim");
}

#[test]
fn branches() {
    let topo = Topology::branches(&[3, 1, 2]);
    topo.validate_structure().unwrap();
    assert_eq!(topo.num_nodes(), 7);
    let leaves: HashSet<&str> = topo.leaves().into_iter().map(|l| l.fmt(&topo)).collect();
    assert_eq!(leaves, hashset! {"3", "4", "6"});
    assert_eq!(topo.victim_branches().len(), 3);
}

#[test]
fn choose_hosts() {
    let topo = Topology::branches(&[3, 1, 2, 2]);
    let mut rng = StdRng::seed_from_u64(0);
    for _ in 0..100 {
        let t = topo.choose_hosts(&mut rng, 2, 1).unwrap();
        t.validate().unwrap();
        let attackers = t.attackers();
        assert_eq!(attackers.len(), 2);
        assert_ne!(
            t.branch_of(attackers[0]).unwrap(),
            t.branch_of(attackers[1]).unwrap()
        );
        let leaves = t.leaves();
        assert!(t.sources().iter().all(|s| leaves.contains(s)));
    }
}

#[test]
fn choose_hosts_deterministic() {
    let topo = Topology::branches(&[3, 1, 2, 2]);
    let a = topo
        .choose_hosts(&mut StdRng::seed_from_u64(7), 1, 1)
        .unwrap();
    let b = topo
        .choose_hosts(&mut StdRng::seed_from_u64(7), 1, 1)
        .unwrap();
    assert_eq!(a.attackers(), b.attackers());
    assert_eq!(a.normal_users(), b.normal_users());
}

#[test]
fn choose_hosts_errors() {
    let topo = Topology::branches(&[3, 1]);
    let mut rng = StdRng::seed_from_u64(0);
    assert!(matches!(
        topo.choose_hosts(&mut rng, 3, 1),
        Err(TopologyError::NotEnoughBranches {
            requested: 3,
            available: 2
        })
    ));
    assert!(matches!(
        topo.choose_hosts(&mut rng, 2, 1),
        Err(TopologyError::NotEnoughLeaves {
            requested: 1,
            available: 0
        })
    ));
}
