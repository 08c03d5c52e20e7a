// Breadth-first accessibility graph generation.
//
// Starting from the floor below `start_point`, repeatedly takes a parent off
// a FIFO frontier, proposes candidates on a grid ring around it (8
// neighbours, plus knight-style offsets when `max_step_connections` > 1),
// classifies each against the parent, and merges the survivors: unseen
// positions become new nodes and join the frontier, known ones just gain an
// edge. A parent with fewer than `min_connections` valid children (or none)
// is a dead end and gets a self-loop at `SENTINEL_COST` instead.
//
// Serial mode (`cores` 0 or 1) expands one parent at a time. Parallel mode
// takes the whole frontier as a batch, classifies it on a rayon pool and
// then merges the results serially in frontier order. Classification reads
// only positions and the oracle, so both modes produce the same graph
// unless `max_nodes` cuts generation short: generation stops once the node
// count exceeds the cap, checked before each
// parent (serial) or each batch (parallel), and an in-flight batch always
// finishes.
//
// See also: `classifier.rs` for the per-candidate test, `graph.rs` for the
// `MutableGraph` being filled.
//
// **Critical constraint: determinism.** IDs are assigned only in the merge
// step, in frontier order, so a given oracle and config always yield the
// same graph for a given mode.

use crate::classifier::{Classified, Classifier};
use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::graph::MutableGraph;
use crate::oracle::RayOracle;
use crate::types::{EdgeMeta, NodeId, Point3, StepType};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::{BTreeSet, VecDeque};
use std::num::NonZeroUsize;

type Children = SmallVec<[Classified; 16]>;

/// Grid offsets `(dx, dy)` tried around every parent, in a fixed order.
///
/// Always the 8-neighbourhood, plus every `(j, k)` with
/// `1 <= |j|, |k| <= max_step_connections` and `|j| != |k|`.
pub fn ring_directions(max_step_connections: u32) -> Vec<(i32, i32)> {
    let mut dirs = BTreeSet::new();
    for dx in -1..=1 {
        for dy in -1..=1 {
            if (dx, dy) != (0, 0) {
                dirs.insert((dx, dy));
            }
        }
    }
    let limit = max_step_connections as i32;
    let steps: Vec<i32> = (1..=limit).flat_map(|v| [v, -v]).collect();
    for &j in &steps {
        for &k in &steps {
            if j.abs() != k.abs() {
                dirs.insert((j, k));
            }
        }
    }
    dirs.into_iter().collect()
}

/// Threads for the parallel path, or `None` to run serially.
fn worker_threads(cores: i32) -> Option<usize> {
    match cores {
        -1 => Some(std::thread::available_parallelism().map_or(1, NonZeroUsize::get)),
        c if c > 1 => Some(c as usize),
        _ => None,
    }
}

/// Generate the accessibility graph of the scene seen through `oracle`.
///
/// Fails with `Error::NoGraph` when the start point has no walkable floor.
pub fn generate<O: RayOracle + ?Sized>(oracle: &O, config: &GeneratorConfig) -> Result<MutableGraph> {
    config.validate()?;
    let classifier = Classifier::new(oracle, config.limits(), config.surface_filter());

    let Some(start) = classifier.project_to_floor(config.start_point) else {
        tracing::warn!(start = %config.start_point, "no walkable floor beneath start point");
        return Err(Error::NoGraph(config.start_point));
    };

    let mut expansion = Expansion {
        classifier,
        directions: ring_directions(config.max_step_connections),
        spacing: config.spacing,
        min_connections: config.min_connections,
        cap: config.node_cap(),
        graph: MutableGraph::new(),
        frontier: VecDeque::new(),
    };
    let seed = expansion.graph.add_node(start, StepType::Flat);
    expansion.frontier.push_back(seed);

    match worker_threads(config.cores) {
        None => expansion.run_serial()?,
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;
            pool.install(|| expansion.run_parallel())?;
        }
    }

    let graph = expansion.graph;
    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        capped = !expansion.frontier.is_empty(),
        "graph generation finished"
    );
    Ok(graph)
}

struct Expansion<'a, O: RayOracle + ?Sized> {
    classifier: Classifier<'a, O>,
    directions: Vec<(i32, i32)>,
    spacing: Point3,
    min_connections: usize,
    cap: Option<usize>,
    graph: MutableGraph,
    frontier: VecDeque<NodeId>,
}

impl<O: RayOracle + ?Sized> Expansion<'_, O> {
    fn at_cap(&self) -> bool {
        self.cap.is_some_and(|cap| self.graph.node_count() > cap)
    }

    fn position(&self, id: NodeId) -> Point3 {
        self.graph.nodes()[id.index()].position
    }

    fn run_serial(&mut self) -> Result<()> {
        while !self.at_cap() {
            let Some(parent) = self.frontier.pop_front() else {
                break;
            };
            let children = expand(&self.classifier, &self.directions, self.spacing, self.position(parent));
            self.merge(parent, &children)?;
        }
        Ok(())
    }

    fn run_parallel(&mut self) -> Result<()> {
        let mut round = 0usize;
        while !self.frontier.is_empty() && !self.at_cap() {
            let batch: Vec<NodeId> = self.frontier.drain(..).collect();
            let parents: Vec<Point3> = batch.iter().map(|&id| self.position(id)).collect();

            let classifier = &self.classifier;
            let directions = &self.directions;
            let spacing = self.spacing;
            let results: Vec<Children> = parents
                .par_iter()
                .map(|&p| expand(classifier, directions, spacing, p))
                .collect();

            for (&parent, children) in batch.iter().zip(&results) {
                self.merge(parent, children)?;
            }
            round += 1;
            tracing::debug!(
                round,
                batch = batch.len(),
                nodes = self.graph.node_count(),
                "frontier batch merged"
            );
        }
        Ok(())
    }

    fn merge(&mut self, parent: NodeId, children: &[Classified]) -> Result<()> {
        if children.is_empty() || children.len() < self.min_connections {
            return self.graph.add_sentinel_loop(parent);
        }
        for child in children {
            let id = match self.graph.node_id(child.position) {
                Some(id) => id,
                None => {
                    let id = self.graph.add_node(child.position, child.step);
                    self.frontier.push_back(id);
                    id
                }
            };
            let meta = EdgeMeta {
                planar_distance: child.planar_distance,
                slope: child.slope,
                step: child.step,
                weight: child.weight,
            };
            self.graph.add_measured_edge(parent, id, child.distance, meta)?;
        }
        Ok(())
    }
}

/// Classify every ring candidate around `parent`.
fn expand<O: RayOracle + ?Sized>(
    classifier: &Classifier<'_, O>,
    directions: &[(i32, i32)],
    spacing: Point3,
    parent: Point3,
) -> Children {
    directions
        .iter()
        .filter_map(|&(dx, dy)| {
            let candidate = Point3::new(
                parent.x + dx as f32 * spacing.x,
                parent.y + dy as f32 * spacing.y,
                parent.z + spacing.z,
            )
            .rounded();
            classifier.classify(parent, candidate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SENTINEL_COST;
    use crate::mesh::{MeshBuilder, TriangleMesh};

    fn flat_plane() -> TriangleMesh {
        MeshBuilder::new()
            .plane(0, (-10.5, -10.5), (10.5, 10.5), 0.0)
            .build()
    }

    fn config(cores: i32) -> GeneratorConfig {
        GeneratorConfig {
            start_point: Point3::new(0.0, 0.0, 1.0),
            cores,
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn ring_sizes() {
        assert_eq!(ring_directions(1).len(), 8);
        assert_eq!(ring_directions(2).len(), 16);
        assert_eq!(ring_directions(3).len(), 32);
        let dirs = ring_directions(2);
        assert!(dirs.contains(&(2, -1)));
        assert!(!dirs.contains(&(2, 2)));
        assert!(dirs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn flat_plane_covers_every_grid_point() {
        let mesh = flat_plane();
        let graph = generate(&mesh, &config(0)).unwrap();
        assert_eq!(graph.node_count(), 441);
        // Each node links to its in-bounds 8-neighbours.
        assert_eq!(graph.edge_count(), 2 * (2 * 21 * 20 + 2 * 20 * 20));
        for (i, node) in graph.nodes().iter().enumerate() {
            assert_eq!(node.id.index(), i);
            assert_eq!(node.step, StepType::Flat);
            assert!(node.position.z.abs() < 1e-4);
        }
        assert_eq!(graph.nodes()[0].position, Point3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn default_costs_are_distances() {
        let mesh = flat_plane();
        let graph = generate(&mesh, &config(0)).unwrap();
        let origin = graph.node_id(Point3::new(0.0, 0.0, 0.0)).unwrap();
        let east = graph.node_id(Point3::new(1.0, 0.0, 0.0)).unwrap();
        let diag = graph.node_id(Point3::new(1.0, 1.0, 0.0)).unwrap();
        assert_eq!(graph.edge_cost(origin, east), Some(1.0));
        let d = graph.edge_cost(origin, diag).unwrap();
        assert!((d - 2f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn start_without_floor_is_no_graph() {
        let mesh = flat_plane();
        let cfg = GeneratorConfig {
            start_point: Point3::new(50.0, 0.0, 1.0),
            ..config(0)
        };
        assert!(matches!(generate(&mesh, &cfg), Err(Error::NoGraph(_))));
    }

    #[test]
    fn serial_runs_are_identical() {
        let mesh = flat_plane();
        let cfg = GeneratorConfig {
            max_step_connections: 2,
            ..config(0)
        };
        let a = generate(&mesh, &cfg).unwrap().compress();
        let b = generate(&mesh, &cfg).unwrap().compress();
        assert_eq!(a.to_lists(), b.to_lists());
    }

    #[test]
    fn parallel_matches_serial_without_cap() {
        let mesh = flat_plane();
        let serial = generate(&mesh, &config(0)).unwrap().compress();
        let parallel = generate(&mesh, &config(4)).unwrap().compress();
        assert_eq!(serial.to_lists(), parallel.to_lists());
    }

    #[test]
    fn node_cap_stops_generation() {
        let mesh = flat_plane();
        let cfg = GeneratorConfig {
            max_nodes: 10,
            ..config(0)
        };
        let graph = generate(&mesh, &cfg).unwrap();
        // The last parent expanded before the cap may add up to 8 nodes.
        assert!(graph.node_count() > 10);
        assert!(graph.node_count() <= 18);
    }

    #[test]
    fn cap_of_one_still_expands_the_seed() {
        let mesh = flat_plane();
        let cfg = GeneratorConfig {
            max_nodes: 1,
            ..config(0)
        };
        let graph = generate(&mesh, &cfg).unwrap();
        assert_eq!(graph.node_count(), 9);
        assert_eq!(graph.edge_count(), 8);
        assert!(graph.edge_cost(NodeId(0), NodeId(1)).is_some());

        let parallel = generate(&mesh, &GeneratorConfig { max_nodes: 1, ..config(2) }).unwrap();
        assert_eq!(parallel.node_count(), 9);
        assert_eq!(parallel.edge_count(), 8);
    }

    #[test]
    fn capped_parallel_run_is_a_superset_of_serial() {
        let mesh = flat_plane();
        let serial = generate(&mesh, &GeneratorConfig { max_nodes: 30, ..config(0) }).unwrap();
        let parallel = generate(&mesh, &GeneratorConfig { max_nodes: 30, ..config(2) }).unwrap();
        assert!(parallel.node_count() >= serial.node_count());
        for (s, p) in serial.nodes().iter().zip(parallel.nodes()) {
            assert!(s.position.distance(p.position) < 1e-3);
        }
    }

    #[test]
    fn isolated_start_gets_sentinel_loop() {
        let mesh = MeshBuilder::new()
            .plane(0, (-0.5, -0.5), (0.5, 0.5), 0.0)
            .build();
        let graph = generate(&mesh, &config(0)).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_cost(NodeId(0), NodeId(0)), Some(SENTINEL_COST));
    }

    #[test]
    fn min_connections_prunes_thin_corridors() {
        // A one-node-wide strip: x in {0, 1, 2}.
        let mesh = MeshBuilder::new()
            .plane(0, (-0.5, -0.5), (2.5, 0.5), 0.0)
            .build();
        let loose = generate(&mesh, &config(0)).unwrap();
        assert_eq!(loose.node_count(), 3);

        let strict = GeneratorConfig {
            min_connections: 3,
            ..config(0)
        };
        let pruned = generate(&mesh, &strict).unwrap();
        assert_eq!(pruned.node_count(), 1);
        assert_eq!(pruned.edge_count(), 1);
        assert_eq!(pruned.edge_cost(NodeId(0), NodeId(0)), Some(SENTINEL_COST));
    }

    #[test]
    fn platform_edges_are_steps() {
        let mesh = MeshBuilder::new()
            .plane(0, (-3.5, -3.5), (3.5, 3.5), 0.0)
            .cuboid(1, Point3::new(0.5, -3.5, 0.0), Point3::new(3.5, 3.5, 0.15))
            .build();
        let graph = generate(&mesh, &config(0)).unwrap().compress();
        let low = graph.node_id(Point3::new(0.0, 0.0, 0.0)).unwrap();
        let high = graph.node_id(Point3::new(1.0, 0.0, 0.15)).unwrap();
        let up = graph.edge_index(low, high).unwrap();
        let down = graph.edge_index(high, low).unwrap();
        assert_eq!(graph.edge_meta(up).step, StepType::StepUp);
        assert_eq!(graph.edge_meta(down).step, StepType::StepDown);
        assert_eq!(graph.node(high).unwrap().step, StepType::StepUp);
    }

    #[test]
    fn obstacle_surfaces_carry_no_nodes() {
        let mesh = MeshBuilder::new()
            .plane(0, (-3.5, -3.5), (3.5, 3.5), 0.0)
            .plane(9, (1.5, -3.5), (3.5, 3.5), 0.01)
            .build();
        let cfg = GeneratorConfig {
            obstacle_ids: vec![9],
            ..config(0)
        };
        let graph = generate(&mesh, &cfg).unwrap();
        assert_eq!(graph.node_count(), 7 * 5);
        assert!(graph.nodes().iter().all(|n| n.position.x <= 1.0));
    }

    #[test]
    fn invalid_config_is_rejected_before_casting() {
        let mesh = flat_plane();
        let cfg = GeneratorConfig {
            spacing: Point3::new(0.0, 1.0, 1.0),
            ..config(0)
        };
        assert!(matches!(generate(&mesh, &cfg), Err(Error::InvalidConfig(_))));
    }
}
