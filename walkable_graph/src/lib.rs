// walkable_graph: accessibility graphs over 3D surface meshes.
//
// Estimates where an agent can walk on a static scene and finds routes
// through that estimate. Geometry is only ever seen through the `RayOracle`
// trait, borrowed for the duration of a generation call.
//
// Module overview:
// - `types.rs`:       Point3, NodeId, StepType, Node, EdgeMeta, rounding policy.
// - `oracle.rs`:      RayOracle trait (nearest hit + occlusion), SurfaceFilter.
// - `mesh.rs`:        TriangleMesh: BVH-backed reference oracle + MeshBuilder scenes.
// - `config.rs`:      GeneratorConfig (JSON-loadable) and ClassifierLimits.
// - `classifier.rs`:  Parent→candidate test: floor, step, slope, line of sight, clearance.
// - `generator.rs`:   BFS frontier expansion, serial or batched on a rayon pool.
// - `graph.rs`:       MutableGraph → CompressedGraph (CSR, named cost sets, node attributes).
// - `costs.rs`:       Derived cost layers (energy, cross slope, step type, slope weight).
// - `pathfinding.rs`: Dijkstra: single pair, multi pair, all pairs, distance/predecessor matrices.
// - `error.rs`:       Error taxonomy shared by every boundary operation.
//
// Typical flow: `generate(&oracle, &config)?.compress()`, then
// `add_cost_layer` for any derived costs, then `shortest_path` and friends.
//
// **Critical constraint: determinism.** A fixed oracle and config give the
// same graph in serial mode. Parallel generation differs from serial only
// when the node cap stops it mid-batch. No `HashMap` iteration anywhere.

pub mod classifier;
pub mod config;
pub mod costs;
pub mod error;
pub mod generator;
pub mod graph;
pub mod mesh;
pub mod oracle;
pub mod pathfinding;
pub mod types;

pub use error::{Error, Result};
