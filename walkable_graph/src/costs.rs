// Derived cost layers.
//
// Each `CostAlgorithm` turns the default-set topology plus the `EdgeMeta`
// recorded at generation time into one value per edge, aligned with the
// default CSR order, and `add_cost_layer` installs it as a named cost set.
// Nothing here casts rays. Rows are computed in parallel and concatenated
// in node order.
//
// Self-loops (dead-end sentinels) keep `SENTINEL_COST` in every layer.
//
// See also: `graph.rs` for `CompressedGraph::add_cost_set`, `types.rs` for
// `EdgeMeta` and `slope_weight`.

use crate::error::Result;
use crate::graph::{CompressedGraph, SENTINEL_COST};
use crate::types::{NodeId, Point3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Planar directions whose normalized dot product is below this are
/// perpendicular.
pub const PERPENDICULAR_TOLERANCE: f32 = 1.0e-3;

/// Slope gradient range accepted by the energy model.
const ENERGY_GRADIENT_LIMIT: f32 = 0.4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CostAlgorithm {
    /// Metabolic cost of walking the edge.
    EnergyExpenditure,
    /// Height change across the direction of travel.
    CrossSlope,
    /// Numeric `StepType` code of the edge.
    StepType,
    /// Planar distance with the asymmetric slope penalty.
    SlopeWeighted,
}

impl CostAlgorithm {
    pub const ALL: [Self; 4] = [
        Self::EnergyExpenditure,
        Self::CrossSlope,
        Self::StepType,
        Self::SlopeWeighted,
    ];

    /// Name of the cost set the layer is stored under.
    pub const fn cost_set_name(self) -> &'static str {
        match self {
            Self::EnergyExpenditure => "EnergyExpenditure",
            Self::CrossSlope => "CrossSlope",
            Self::StepType => "StepType",
            Self::SlopeWeighted => "SlopeWeighted",
        }
    }
}

/// Energy per unit distance at `slope_degrees`, from an empirical fit of
/// walking energy against gradient. The gradient is clamped to ±0.4.
pub fn energy_per_distance(slope_degrees: f32) -> f32 {
    let g = slope_degrees
        .to_radians()
        .tan()
        .clamp(-ENERGY_GRADIENT_LIMIT, ENERGY_GRADIENT_LIMIT);
    let g2 = g * g;
    let g3 = g2 * g;
    let g4 = g3 * g;
    let g5 = g4 * g;
    280.5 * g5 - 58.7 * g4 - 76.8 * g3 + 51.9 * g2 + 19.6 * g + 2.5
}

/// Compute `algorithm` for every default-set edge, in CSR order.
pub fn derive_costs(graph: &CompressedGraph, algorithm: CostAlgorithm) -> Vec<f32> {
    let rows: Vec<Vec<f32>> = (0..graph.node_count())
        .into_par_iter()
        .map(|p| {
            let parent = NodeId(p as u32);
            graph
                .edge_range(parent)
                .map(|edge| {
                    if graph.edge_child(edge) == parent {
                        SENTINEL_COST
                    } else {
                        edge_cost(graph, algorithm, parent, edge)
                    }
                })
                .collect()
        })
        .collect();
    rows.concat()
}

/// Derive `algorithm` and store it under its cost set name.
pub fn add_cost_layer(graph: &mut CompressedGraph, algorithm: CostAlgorithm) -> Result<()> {
    let values = derive_costs(graph, algorithm);
    tracing::debug!(
        layer = algorithm.cost_set_name(),
        edges = values.len(),
        "derived cost layer"
    );
    graph.add_cost_set(algorithm.cost_set_name(), values)
}

fn position(graph: &CompressedGraph, id: NodeId) -> Point3 {
    graph.nodes()[id.index()].position
}

fn edge_cost(graph: &CompressedGraph, algorithm: CostAlgorithm, parent: NodeId, edge: usize) -> f32 {
    let meta = graph.edge_meta(edge);
    match algorithm {
        CostAlgorithm::EnergyExpenditure => {
            let from = position(graph, parent);
            let to = position(graph, graph.edge_child(edge));
            energy_per_distance(meta.slope) * from.distance(to)
        }
        CostAlgorithm::CrossSlope => cross_slope(graph, parent, edge),
        CostAlgorithm::StepType => meta.step.code() as f32,
        CostAlgorithm::SlopeWeighted => meta.weight,
    }
}

fn planar_direction(from: Point3, to: Point3) -> Option<Point3> {
    Point3::new(to.x - from.x, to.y - from.y, 0.0).normalized()
}

fn cross_slope(graph: &CompressedGraph, parent: NodeId, edge: usize) -> f32 {
    let origin = position(graph, parent);
    let target = position(graph, graph.edge_child(edge));
    let Some(heading) = planar_direction(origin, target) else {
        return origin.distance(target);
    };

    // (position, distance from parent) of each perpendicular sibling.
    let perpendicular: SmallVec<[(Point3, f32); 4]> = graph
        .edge_range(parent)
        .filter(|&sibling| sibling != edge)
        .filter_map(|sibling| {
            let pos = position(graph, graph.edge_child(sibling));
            let dir = planar_direction(origin, pos)?;
            (heading.dot(dir).abs() < PERPENDICULAR_TOLERANCE)
                .then(|| (pos, origin.distance(pos)))
        })
        .collect();

    match perpendicular.as_slice() {
        [] => origin.distance(target),
        [(pos, dist)] => (target.z - pos.z).abs() + dist,
        [(first, dist), (second, _), ..] => (first.z - second.z).abs() + dist,
    }
}
