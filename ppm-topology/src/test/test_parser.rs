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

use pretty_assertions::assert_eq;

use crate::{formatter::TopologyFormatter, types::*, Topology, TopologyParser};

const TOPO: &str = "# victim is 0
0 1
1 2   # inline comment
2 3

0 4
4 5
attacker 3
normal 5
";

#[test]
fn parse_simple() {
    let topo: Topology = TOPO.parse().unwrap();
    topo.validate().unwrap();
    assert_eq!(topo.num_nodes(), 6);
    assert_eq!(topo.num_links(), 5);
    let v = topo.node_id("0").unwrap();
    assert_eq!(topo.victim(), Some(v));
    let a = topo.attackers()[0];
    assert_eq!(a.fmt(&topo), "3");
    assert_eq!(topo.path_to_victim(a).unwrap().fmt(&topo), "3 -> 2 -> 1 -> 0");
    assert_eq!(topo.normal_users()[0].fmt(&topo), "5");
}

#[test]
fn parse_explicit_victim() {
    let topo: Topology = "victim v\nv a\nv b\nattacker a\nnormal b".parse().unwrap();
    topo.validate().unwrap();
    assert_eq!(topo.victim().fmt(&topo), "v");
}

#[test]
fn parse_without_victim() {
    let topo: Topology = "1 2\n1 3".parse().unwrap();
    assert_eq!(topo.victim(), None);
    assert!(matches!(topo.validate(), Err(TopologyError::MissingVictim)));
}

#[test]
fn parse_errors() {
    assert!(matches!(
        TopologyParser::new("0 1\n0 1 2"),
        Err(TopologyError::Parse { line: 2, .. })
    ));
    assert!(matches!(
        TopologyParser::new("0 1\n\n0"),
        Err(TopologyError::Parse { line: 3, .. })
    ));
    assert!(matches!(
        TopologyParser::new("1 1"),
        Err(TopologyError::Parse { line: 1, .. })
    ));
    assert!(matches!(
        TopologyParser::new("victim 0\nvictim 1"),
        Err(TopologyError::Parse { line: 2, .. })
    ));
    assert!(matches!(
        "0 1\nattacker 7".parse::<Topology>(),
        Err(TopologyError::Parse { line: 2, .. })
    ));
    assert!(matches!(
        "0 1\nattacker 0".parse::<Topology>(),
        Err(TopologyError::Parse { line: 2, .. })
    ));
    assert!(matches!(
        "victim 9\n0 1".parse::<Topology>(),
        Err(TopologyError::NodeNameNotFound(_))
    ));
}

#[test]
fn parse_from_file() {
    let path = std::env::temp_dir().join(format!("ppm-topology-{}.txt", std::process::id()));
    std::fs::write(&path, TOPO).unwrap();
    let topo = Topology::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(topo.is_valid());

    assert!(matches!(
        Topology::from_file("/this/file/does/not/exist"),
        Err(TopologyError::Io(_))
    ));
}
