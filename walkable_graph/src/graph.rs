// Multi-cost graph store.
//
// Two types model the graph lifecycle:
//
// - `MutableGraph`: the only place nodes can be created. Nodes get dense
//   sequential `NodeId`s keyed by their rounded position; edges carry a cost
//   in the default cost set ("Distance") plus `EdgeMeta`. Re-adding an edge
//   overwrites its cost.
// - `CompressedGraph`: produced by `MutableGraph::compress`. Edges are laid
//   out in CSR order (rows by parent, children sorted by id). Named
//   alternate cost sets are parallel `Vec<f32>`s aligned to the default
//   edge order, with NaN marking "no cost for this edge". Once any
//   alternate set exists the topology is frozen.
//
// A string-keyed node attribute table lives beside the cost sets and can be
// promoted into a cost set with `attrs_to_cost`.
//
// See also: `generator.rs` which fills a `MutableGraph`, `costs.rs` which
// derives alternate cost sets, `pathfinding.rs` which reads `CsrView`s.
//
// **Critical constraint: determinism.** Node and edge order comes only from
// `Vec`s. The position lookup is an `FxHashMap` but is never iterated;
// cost sets and attributes are `BTreeMap`s.

use crate::error::{Error, Result};
use crate::types::{EdgeMeta, Node, NodeId, Point3, PositionKey, StepType};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Name of the cost set that owns the topology.
pub const DEFAULT_COST_SET: &str = "Distance";

/// Cost of the self-loop given to nodes with no usable neighbours.
pub const SENTINEL_COST: f32 = 1.0e12;

/// Map `""` to the default cost set.
pub fn resolve_cost_set(name: &str) -> &str {
    if name.is_empty() { DEFAULT_COST_SET } else { name }
}

fn is_default(name: &str) -> bool {
    resolve_cost_set(name) == DEFAULT_COST_SET
}

/// Reduction applied by `aggregate_edge_costs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregate {
    Sum,
    Average,
    /// Number of incident edges with a positive cost.
    Count,
}

/// Which endpoint's attribute becomes the edge cost in `attrs_to_cost`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// The child's value.
    Incoming,
    /// The parent's value.
    Outgoing,
    /// Sum of both.
    Both,
}

/// One edge of `CompressedGraph::to_lists`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub parent: NodeId,
    pub child: NodeId,
    pub cost: f32,
}

#[derive(Clone, Copy, Debug)]
struct PendingEdge {
    child: NodeId,
    cost: f32,
    meta: EdgeMeta,
}

fn check_node(id: NodeId, len: usize) -> Result<()> {
    if id.index() < len {
        Ok(())
    } else {
        Err(Error::OutOfRange { id, len })
    }
}

// ---------------------------------------------------------------------------
// MutableGraph
// ---------------------------------------------------------------------------

/// A graph still open for node and edge creation.
#[derive(Clone, Debug, Default)]
pub struct MutableGraph {
    nodes: Vec<Node>,
    lookup: FxHashMap<PositionKey, NodeId>,
    rows: Vec<SmallVec<[PendingEdge; 8]>>,
}

impl MutableGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// ID of the node at `position` (after rounding), if any.
    pub fn node_id(&self, position: Point3) -> Option<NodeId> {
        self.lookup.get(&position.key()).copied()
    }

    /// Return the node at `position`, creating it if needed.
    pub fn add_node(&mut self, position: Point3, step: StepType) -> NodeId {
        let position = position.rounded();
        let key = position.key();
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { id, position, step });
        self.lookup.insert(key, id);
        self.rows.push(SmallVec::new());
        id
    }

    /// Add or overwrite a default-set edge, inferring its metadata from the
    /// endpoint positions.
    pub fn add_edge(&mut self, parent: NodeId, child: NodeId, cost: f32) -> Result<()> {
        let len = self.nodes.len();
        check_node(parent, len)?;
        check_node(child, len)?;
        let meta = EdgeMeta::between(
            self.nodes[parent.index()].position,
            self.nodes[child.index()].position,
        );
        self.add_measured_edge(parent, child, cost, meta)
    }

    /// Add or overwrite a default-set edge with explicit metadata.
    pub fn add_measured_edge(
        &mut self,
        parent: NodeId,
        child: NodeId,
        cost: f32,
        meta: EdgeMeta,
    ) -> Result<()> {
        let len = self.nodes.len();
        check_node(parent, len)?;
        check_node(child, len)?;
        let row = &mut self.rows[parent.index()];
        match row.iter_mut().find(|e| e.child == child) {
            Some(existing) => {
                existing.cost = cost;
                existing.meta = meta;
            }
            None => row.push(PendingEdge { child, cost, meta }),
        }
        Ok(())
    }

    /// Add an edge between two positions, creating either endpoint.
    pub fn add_edge_between(&mut self, parent: Point3, child: Point3, cost: f32) -> Result<()> {
        let p = self.add_node(parent, StepType::Flat);
        let c = self.add_node(child, StepType::Flat);
        self.add_edge(p, c, cost)
    }

    /// Cost-set-addressed edge insertion. Only the default set is writable
    /// before compression.
    pub fn add_edge_in(
        &mut self,
        parent: NodeId,
        child: NodeId,
        cost: f32,
        cost_set: &str,
    ) -> Result<()> {
        if !is_default(cost_set) {
            return Err(Error::NotCompressed(cost_set.to_string()));
        }
        self.add_edge(parent, child, cost)
    }

    /// Give `node` a self-loop at `SENTINEL_COST`.
    pub fn add_sentinel_loop(&mut self, node: NodeId) -> Result<()> {
        self.add_measured_edge(node, node, SENTINEL_COST, EdgeMeta::default())
    }

    /// Default-set cost of `parent -> child`, if present.
    pub fn edge_cost(&self, parent: NodeId, child: NodeId) -> Option<f32> {
        self.rows
            .get(parent.index())?
            .iter()
            .find(|e| e.child == child)
            .map(|e| e.cost)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Build the CSR layout. Children within a row are sorted by id.
    pub fn compress(self) -> CompressedGraph {
        let n = self.nodes.len();
        let edge_count = self.edge_count();
        let mut offsets = Vec::with_capacity(n + 1);
        let mut children = Vec::with_capacity(edge_count);
        let mut costs = Vec::with_capacity(edge_count);
        let mut metas = Vec::with_capacity(edge_count);

        offsets.push(0);
        for mut row in self.rows {
            row.sort_by_key(|e| e.child);
            for edge in row {
                children.push(edge.child);
                costs.push(edge.cost);
                metas.push(edge.meta);
            }
            offsets.push(children.len());
        }

        let mut cost_sets = BTreeMap::new();
        cost_sets.insert(DEFAULT_COST_SET.to_string(), costs);
        tracing::debug!(nodes = n, edges = edge_count, "compressed graph");

        CompressedGraph {
            nodes: self.nodes,
            lookup: self.lookup,
            offsets,
            children,
            metas,
            cost_sets,
            attributes: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// CompressedGraph
// ---------------------------------------------------------------------------

/// Read-only CSR view of one cost set. Edges without a cost in that set are
/// skipped by `row`.
#[derive(Clone, Copy, Debug)]
pub struct CsrView<'a> {
    offsets: &'a [usize],
    children: &'a [NodeId],
    costs: &'a [f32],
}

impl<'a> CsrView<'a> {
    pub fn node_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Number of edges with a cost in this set.
    pub fn nnz(&self) -> usize {
        self.costs.iter().filter(|c| !c.is_nan()).count()
    }

    /// `(child, cost)` for every costed edge leaving `node`.
    ///
    /// Panics if `node` is not in the graph.
    pub fn row(self, node: NodeId) -> impl Iterator<Item = (NodeId, f32)> + 'a {
        let i = node.index();
        let range = self.offsets[i]..self.offsets[i + 1];
        let children = &self.children[range.clone()];
        let costs = &self.costs[range];
        children
            .iter()
            .zip(costs)
            .filter(|(_, c)| !c.is_nan())
            .map(|(&child, &cost)| (child, cost))
    }
}

/// Graph with frozen node set and CSR edges.
#[derive(Clone, Debug)]
pub struct CompressedGraph {
    nodes: Vec<Node>,
    lookup: FxHashMap<PositionKey, NodeId>,
    offsets: Vec<usize>,
    children: Vec<NodeId>,
    metas: Vec<EdgeMeta>,
    cost_sets: BTreeMap<String, Vec<f32>>,
    attributes: BTreeMap<String, Vec<Option<String>>>,
}

#[derive(Serialize)]
struct GraphLists<'a> {
    nodes: &'a [Node],
    edges: Vec<EdgeRecord>,
}

impl CompressedGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of default-set edges.
    pub fn edge_count(&self) -> usize {
        self.children.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node_id(&self, position: Point3) -> Option<NodeId> {
        self.lookup.get(&position.key()).copied()
    }

    /// Nearest node to `point`, measuring only the axes flagged in `axes`
    /// (x, y, z). Ties go to the lower id.
    pub fn closest_node(&self, point: Point3, axes: [bool; 3]) -> Option<NodeId> {
        let weight = |on: bool| if on { 1.0 } else { 0.0 };
        let (wx, wy, wz) = (weight(axes[0]), weight(axes[1]), weight(axes[2]));
        self.nodes
            .iter()
            .map(|n| {
                let d = n.position - point;
                (n.id, wx * d.x * d.x + wy * d.y * d.y + wz * d.z * d.z)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id)
    }

    /// Default-set edge range leaving `node`, as CSR indices for
    /// `edge_child`/`edge_meta`.
    ///
    /// Panics if `node` is not in the graph. Use `edge_index` or
    /// `get_edge_cost` for checked lookups.
    pub fn edge_range(&self, node: NodeId) -> std::ops::Range<usize> {
        self.offsets[node.index()]..self.offsets[node.index() + 1]
    }

    /// Child of the edge at CSR index `edge`. Panics past `edge_count()`.
    pub fn edge_child(&self, edge: usize) -> NodeId {
        self.children[edge]
    }

    /// Metadata of the edge at CSR index `edge`. Panics past `edge_count()`.
    pub fn edge_meta(&self, edge: usize) -> &EdgeMeta {
        &self.metas[edge]
    }

    /// CSR index of `parent -> child` in the default set.
    pub fn edge_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        if parent.index() >= self.nodes.len() {
            return None;
        }
        let range = self.edge_range(parent);
        let start = range.start;
        self.children[range]
            .binary_search(&child)
            .ok()
            .map(|i| start + i)
    }

    /// Names of every cost set, default included.
    pub fn cost_set_names(&self) -> impl Iterator<Item = &str> {
        self.cost_sets.keys().map(String::as_str)
    }

    pub fn has_cost_set(&self, cost_set: &str) -> bool {
        self.cost_sets.contains_key(resolve_cost_set(cost_set))
    }

    /// True once any alternate cost set exists.
    pub fn is_frozen(&self) -> bool {
        self.cost_sets.len() > 1
    }

    fn costs(&self, cost_set: &str) -> Result<&Vec<f32>> {
        let name = resolve_cost_set(cost_set);
        self.cost_sets
            .get(name)
            .ok_or_else(|| Error::NoCost(name.to_string()))
    }

    /// CSR view of `cost_set`. Calling it again returns the same data.
    pub fn compress(&self, cost_set: &str) -> Result<CsrView<'_>> {
        let costs = self.costs(cost_set)?;
        Ok(CsrView {
            offsets: &self.offsets,
            children: &self.children,
            costs,
        })
    }

    /// Every cost recorded in `cost_set`, in CSR order.
    pub fn cost_values(&self, cost_set: &str) -> Result<Vec<f32>> {
        Ok(self
            .costs(cost_set)?
            .iter()
            .copied()
            .filter(|c| !c.is_nan())
            .collect())
    }

    /// Write a cost for `parent -> child`.
    ///
    /// On the default set this updates an existing edge or, while no
    /// alternate set exists, inserts a new one. On any other set the edge
    /// must already exist in the default set.
    pub fn add_edge(
        &mut self,
        parent: NodeId,
        child: NodeId,
        cost: f32,
        cost_set: &str,
    ) -> Result<()> {
        let len = self.nodes.len();
        check_node(parent, len)?;
        check_node(child, len)?;
        let name = resolve_cost_set(cost_set);

        let Some(edge) = self.edge_index(parent, child) else {
            if name != DEFAULT_COST_SET {
                return Err(Error::InvalidCostOperation(format!(
                    "edge {parent} -> {child} is not in the default cost set"
                )));
            }
            if self.is_frozen() {
                return Err(Error::InvalidCostOperation(format!(
                    "cannot add edge {parent} -> {child}: topology is frozen"
                )));
            }
            self.insert_default_edge(parent, child, cost);
            return Ok(());
        };

        let edge_count = self.children.len();
        self.cost_sets
            .entry(name.to_string())
            .or_insert_with(|| vec![f32::NAN; edge_count])[edge] = cost;
        Ok(())
    }

    fn insert_default_edge(&mut self, parent: NodeId, child: NodeId, cost: f32) {
        let range = self.edge_range(parent);
        let pos = range.start + self.children[range].partition_point(|&c| c < child);
        let meta = EdgeMeta::between(
            self.nodes[parent.index()].position,
            self.nodes[child.index()].position,
        );
        self.children.insert(pos, child);
        self.metas.insert(pos, meta);
        for costs in self.cost_sets.values_mut() {
            costs.insert(pos, cost);
        }
        for offset in &mut self.offsets[parent.index() + 1..] {
            *offset += 1;
        }
    }

    /// Install a whole cost set aligned to the default edge order.
    pub fn add_cost_set(&mut self, cost_set: &str, values: Vec<f32>) -> Result<()> {
        if is_default(cost_set) {
            return Err(Error::InvalidCostOperation(
                "the default cost set cannot be replaced".into(),
            ));
        }
        if values.len() != self.children.len() {
            return Err(Error::LengthMismatch {
                left: values.len(),
                right: self.children.len(),
            });
        }
        self.cost_sets.insert(cost_set.to_string(), values);
        Ok(())
    }

    /// Remove an alternate cost set.
    pub fn clear_cost_set(&mut self, cost_set: &str) -> Result<()> {
        if is_default(cost_set) {
            return Err(Error::InvalidCostOperation(
                "the default cost set cannot be cleared".into(),
            ));
        }
        self.cost_sets
            .remove(cost_set)
            .map(|_| ())
            .ok_or_else(|| Error::NoCost(cost_set.to_string()))
    }

    /// Cost of `parent -> child` in `cost_set`; `None` if that set has no
    /// cost for the pair.
    pub fn get_edge_cost(&self, parent: NodeId, child: NodeId, cost_set: &str) -> Result<Option<f32>> {
        let costs = self.costs(cost_set)?;
        let len = self.nodes.len();
        check_node(parent, len)?;
        check_node(child, len)?;
        Ok(self
            .edge_index(parent, child)
            .map(|e| costs[e])
            .filter(|c| !c.is_nan()))
    }

    /// `get_edge_cost` over many pairs.
    pub fn get_edge_costs(
        &self,
        cost_set: &str,
        pairs: &[(NodeId, NodeId)],
    ) -> Result<Vec<Option<f32>>> {
        pairs
            .iter()
            .map(|&(p, c)| self.get_edge_cost(p, c, cost_set))
            .collect()
    }

    /// Per-node reduction over incident costed edges. Directed graphs count
    /// outgoing edges only; undirected ones credit both endpoints.
    pub fn aggregate_edge_costs(
        &self,
        cost_set: &str,
        aggregate: Aggregate,
        directed: bool,
    ) -> Result<Vec<f32>> {
        let costs = self.costs(cost_set)?;
        let n = self.nodes.len();
        let mut sums = vec![0.0f32; n];
        let mut counts = vec![0u32; n];
        let mut credit = |node: usize, cost: f32| {
            sums[node] += cost;
            if cost > 0.0 {
                counts[node] += 1;
            }
        };

        for parent in 0..n {
            for edge in self.offsets[parent]..self.offsets[parent + 1] {
                let cost = costs[edge];
                if cost.is_nan() {
                    continue;
                }
                credit(parent, cost);
                if !directed {
                    credit(self.children[edge].index(), cost);
                }
            }
        }

        Ok(match aggregate {
            Aggregate::Sum => sums,
            Aggregate::Count => counts.into_iter().map(|c| c as f32).collect(),
            Aggregate::Average => sums
                .into_iter()
                .zip(counts)
                .map(|(s, c)| if c == 0 { 0.0 } else { s / c as f32 })
                .collect(),
        })
    }

    // -----------------------------------------------------------------------
    // Node attributes
    // -----------------------------------------------------------------------

    /// Set `attribute` for each of `ids` to the matching entry of `values`.
    pub fn add_node_attributes<S: AsRef<str>>(
        &mut self,
        attribute: &str,
        ids: &[NodeId],
        values: &[S],
    ) -> Result<()> {
        if ids.len() != values.len() {
            return Err(Error::LengthMismatch {
                left: ids.len(),
                right: values.len(),
            });
        }
        let n = self.nodes.len();
        for &id in ids {
            check_node(id, n)?;
        }
        let column = self
            .attributes
            .entry(attribute.to_string())
            .or_insert_with(|| vec![None; n]);
        for (&id, value) in ids.iter().zip(values) {
            column[id.index()] = Some(value.as_ref().to_string());
        }
        Ok(())
    }

    /// Values of `attribute`, indexed by node id.
    pub fn node_attributes(&self, attribute: &str) -> Result<&[Option<String>]> {
        self.attributes
            .get(attribute)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownAttribute(attribute.to_string()))
    }

    pub fn clear_node_attribute(&mut self, attribute: &str) -> Result<()> {
        self.attributes
            .remove(attribute)
            .map(|_| ())
            .ok_or_else(|| Error::UnknownAttribute(attribute.to_string()))
    }

    /// Promote a numeric node attribute into the cost set `cost_set`.
    /// Edges whose chosen endpoint has no numeric value get no cost.
    pub fn attrs_to_cost(&mut self, attribute: &str, cost_set: &str, direction: Direction) -> Result<()> {
        if is_default(cost_set) {
            return Err(Error::InvalidCostOperation(
                "attributes cannot overwrite the default cost set".into(),
            ));
        }
        let column = self.node_attributes(attribute)?;
        let numeric: Vec<Option<f32>> = column
            .iter()
            .map(|v| v.as_deref().and_then(|s| s.trim().parse::<f32>().ok()))
            .collect();

        let mut values = Vec::with_capacity(self.children.len());
        for parent in 0..self.nodes.len() {
            for edge in self.offsets[parent]..self.offsets[parent + 1] {
                let child = self.children[edge].index();
                let value = match direction {
                    Direction::Incoming => numeric[child],
                    Direction::Outgoing => numeric[parent],
                    Direction::Both => numeric[parent].zip(numeric[child]).map(|(a, b)| a + b),
                };
                values.push(value.unwrap_or(f32::NAN));
            }
        }
        self.add_cost_set(cost_set, values)
    }

    // -----------------------------------------------------------------------
    // Export and lifecycle
    // -----------------------------------------------------------------------

    /// Node list plus default-set edge list, in id and CSR order.
    pub fn to_lists(&self) -> (Vec<Node>, Vec<EdgeRecord>) {
        let costs = &self.cost_sets[DEFAULT_COST_SET];
        let mut edges = Vec::with_capacity(self.children.len());
        for (parent, window) in self.offsets.windows(2).enumerate() {
            for edge in window[0]..window[1] {
                edges.push(EdgeRecord {
                    parent: NodeId(parent as u32),
                    child: self.children[edge],
                    cost: costs[edge],
                });
            }
        }
        (self.nodes.clone(), edges)
    }

    pub fn to_json(&self) -> Result<String> {
        let (_, edges) = self.to_lists();
        let lists = GraphLists {
            nodes: &self.nodes,
            edges,
        };
        Ok(serde_json::to_string(&lists)?)
    }

    /// Reopen for mutation. Refused once an alternate cost set exists.
    pub fn into_mutable(self) -> std::result::Result<MutableGraph, Box<Self>> {
        if self.is_frozen() {
            return Err(Box::new(self));
        }
        let costs = &self.cost_sets[DEFAULT_COST_SET];
        let mut rows: Vec<SmallVec<[PendingEdge; 8]>> = Vec::with_capacity(self.nodes.len());
        for window in self.offsets.windows(2) {
            rows.push(
                (window[0]..window[1])
                    .map(|e| PendingEdge {
                        child: self.children[e],
                        cost: costs[e],
                        meta: self.metas[e],
                    })
                    .collect(),
            );
        }
        Ok(MutableGraph {
            nodes: self.nodes,
            lookup: self.lookup,
            rows,
        })
    }

    /// Drop everything and start over.
    pub fn clear(self) -> MutableGraph {
        MutableGraph::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 -> 1 (100), 0 -> 2 (50), 1 -> 2 (20).
    fn triangle() -> CompressedGraph {
        let mut g = MutableGraph::new();
        let a = g.add_node(Point3::new(0.0, 0.0, 0.0), StepType::Flat);
        let b = g.add_node(Point3::new(1.0, 0.0, 0.0), StepType::Flat);
        let c = g.add_node(Point3::new(2.0, 0.0, 0.0), StepType::Flat);
        g.add_edge(a, b, 100.0).unwrap();
        g.add_edge(a, c, 50.0).unwrap();
        g.add_edge(b, c, 20.0).unwrap();
        g.compress()
    }

    #[test]
    fn checked_lookups_reject_unknown_nodes() {
        let g = triangle();
        assert_eq!(g.edge_index(NodeId(7), NodeId(0)), None);
        assert!(matches!(
            g.get_edge_cost(NodeId(7), NodeId(0), ""),
            Err(Error::OutOfRange { len: 3, .. })
        ));
        assert_eq!(g.edge_range(NodeId(2)), 3..3);
    }

    #[test]
    #[should_panic]
    fn edge_range_panics_on_unknown_node() {
        let g = triangle();
        let _ = g.edge_range(NodeId(7));
    }

    #[test]
    #[should_panic]
    fn csr_row_panics_on_unknown_node() {
        let g = triangle();
        let csr = g.compress("").unwrap();
        let _ = csr.row(NodeId(7)).count();
    }

    #[test]
    fn node_ids_are_dense_and_deduplicated() {
        let mut g = MutableGraph::new();
        let a = g.add_node(Point3::new(0.0, 0.0, 0.0), StepType::Flat);
        let b = g.add_node(Point3::new(1.0, 0.0, 0.0), StepType::StepUp);
        let again = g.add_node(Point3::new(1.00001, 0.0, 0.0), StepType::Flat);
        assert_eq!((a, b, again), (NodeId(0), NodeId(1), NodeId(1)));
        for (i, node) in g.nodes().iter().enumerate() {
            assert_eq!(node.id.index(), i);
        }
        assert_eq!(g.node(b).unwrap().step, StepType::StepUp);
        assert_eq!(g.node_id(Point3::new(0.99999, 0.0, 0.0)), Some(b));
    }

    #[test]
    fn duplicate_edge_overwrites_cost() {
        let mut g = MutableGraph::new();
        g.add_edge_between(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), 3.0)
            .unwrap();
        g.add_edge_between(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), 7.0)
            .unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edge_cost(NodeId(0), NodeId(1)), Some(7.0));
    }

    #[test]
    fn edges_to_unknown_nodes_are_out_of_range() {
        let mut g = MutableGraph::new();
        g.add_node(Point3::default(), StepType::Flat);
        let err = g.add_edge(NodeId(0), NodeId(5), 1.0).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { len: 1, .. }));
    }

    #[test]
    fn alternate_cost_before_compression_is_rejected() {
        let mut g = MutableGraph::new();
        let a = g.add_node(Point3::new(0.0, 0.0, 0.0), StepType::Flat);
        let b = g.add_node(Point3::new(1.0, 0.0, 0.0), StepType::Flat);
        g.add_edge_in(a, b, 1.0, "").unwrap();
        let err = g.add_edge_in(a, b, 1.0, "Energy").unwrap_err();
        assert!(matches!(err, Error::NotCompressed(_)));
    }

    #[test]
    fn csr_rows_are_sorted_by_child() {
        let mut g = MutableGraph::new();
        let ids: Vec<_> = (0..4)
            .map(|i| g.add_node(Point3::new(i as f32, 0.0, 0.0), StepType::Flat))
            .collect();
        g.add_edge(ids[0], ids[3], 3.0).unwrap();
        g.add_edge(ids[0], ids[1], 1.0).unwrap();
        g.add_edge(ids[0], ids[2], 2.0).unwrap();
        let cg = g.compress();
        let csr = cg.compress("").unwrap();
        let row: Vec<_> = csr.row(ids[0]).collect();
        assert_eq!(
            row,
            vec![(ids[1], 1.0), (ids[2], 2.0), (ids[3], 3.0)]
        );
        assert_eq!(csr.node_count(), 4);
        assert_eq!(csr.nnz(), 3);
    }

    #[test]
    fn alternate_costs_round_trip() {
        let mut g = triangle();
        g.add_edge(NodeId(0), NodeId(1), 7.5, "Energy").unwrap();
        assert_eq!(g.get_edge_cost(NodeId(0), NodeId(1), "Energy").unwrap(), Some(7.5));
        // Present in the default set but not costed in the new one.
        assert_eq!(g.get_edge_cost(NodeId(0), NodeId(2), "Energy").unwrap(), None);
        assert_eq!(g.get_edge_cost(NodeId(0), NodeId(2), "").unwrap(), Some(50.0));
        assert_eq!(g.compress("Energy").unwrap().nnz(), 1);
    }

    #[test]
    fn alternate_cost_for_missing_edge_is_invalid() {
        let mut g = triangle();
        let err = g.add_edge(NodeId(2), NodeId(0), 1.0, "Energy").unwrap_err();
        assert!(matches!(err, Error::InvalidCostOperation(_)));
        assert!(!g.has_cost_set("Energy"));
    }

    #[test]
    fn unknown_cost_set_is_no_cost() {
        let g = triangle();
        assert!(matches!(g.compress("Nope"), Err(Error::NoCost(_))));
        assert!(matches!(
            g.get_edge_cost(NodeId(0), NodeId(1), "Nope"),
            Err(Error::NoCost(_))
        ));
    }

    #[test]
    fn default_edges_can_be_added_until_frozen() {
        let mut g = triangle();
        g.add_edge(NodeId(2), NodeId(0), 5.0, "").unwrap();
        assert_eq!(g.edge_count(), 4);
        assert_eq!(g.get_edge_cost(NodeId(2), NodeId(0), "").unwrap(), Some(5.0));
        assert_eq!(g.get_edge_cost(NodeId(1), NodeId(2), "").unwrap(), Some(20.0));

        g.add_edge(NodeId(0), NodeId(1), 1.0, "Energy").unwrap();
        assert!(g.is_frozen());
        let err = g.add_edge(NodeId(1), NodeId(0), 5.0, "").unwrap_err();
        assert!(matches!(err, Error::InvalidCostOperation(_)));
        // Updating an existing default edge is still fine.
        g.add_edge(NodeId(0), NodeId(1), 99.0, "").unwrap();
        assert_eq!(g.get_edge_cost(NodeId(0), NodeId(1), "").unwrap(), Some(99.0));
    }

    #[test]
    fn batch_edge_costs() {
        let g = triangle();
        let got = g
            .get_edge_costs("", &[(NodeId(0), NodeId(1)), (NodeId(2), NodeId(1)), (NodeId(1), NodeId(2))])
            .unwrap();
        assert_eq!(got, vec![Some(100.0), None, Some(20.0)]);
    }

    #[test]
    fn aggregate_costs() {
        let g = triangle();
        assert_eq!(
            g.aggregate_edge_costs("", Aggregate::Sum, true).unwrap(),
            vec![150.0, 20.0, 0.0]
        );
        assert_eq!(
            g.aggregate_edge_costs("", Aggregate::Sum, false).unwrap(),
            vec![150.0, 120.0, 70.0]
        );
        assert_eq!(
            g.aggregate_edge_costs("", Aggregate::Count, true).unwrap(),
            vec![2.0, 1.0, 0.0]
        );
        assert_eq!(
            g.aggregate_edge_costs("", Aggregate::Average, true).unwrap(),
            vec![75.0, 20.0, 0.0]
        );
    }

    #[test]
    fn attributes_promote_to_costs() {
        let mut g = triangle();
        let ids = [NodeId(0), NodeId(1), NodeId(2)];
        g.add_node_attributes("height", &ids, &["0", "100", "200"]).unwrap();

        g.attrs_to_cost("height", "attr_in", Direction::Incoming).unwrap();
        assert_eq!(g.get_edge_cost(NodeId(1), NodeId(2), "attr_in").unwrap(), Some(200.0));
        assert_eq!(g.get_edge_cost(NodeId(0), NodeId(1), "attr_in").unwrap(), Some(100.0));

        g.attrs_to_cost("height", "attr_out", Direction::Outgoing).unwrap();
        assert_eq!(g.get_edge_cost(NodeId(1), NodeId(2), "attr_out").unwrap(), Some(100.0));

        g.attrs_to_cost("height", "attr_both", Direction::Both).unwrap();
        assert_eq!(g.get_edge_cost(NodeId(1), NodeId(2), "attr_both").unwrap(), Some(300.0));
    }

    #[test]
    fn non_numeric_attributes_leave_edges_uncosted() {
        let mut g = triangle();
        g.add_node_attributes("tag", &[NodeId(1), NodeId(2)], &["grass", "4.5"])
            .unwrap();
        g.attrs_to_cost("tag", "tag_cost", Direction::Incoming).unwrap();
        assert_eq!(g.get_edge_cost(NodeId(0), NodeId(1), "tag_cost").unwrap(), None);
        assert_eq!(g.get_edge_cost(NodeId(0), NodeId(2), "tag_cost").unwrap(), Some(4.5));
        assert_eq!(g.node_attributes("tag").unwrap()[0], None);
    }

    #[test]
    fn attribute_errors() {
        let mut g = triangle();
        assert!(matches!(
            g.add_node_attributes("a", &[NodeId(0)], &["1", "2"]),
            Err(Error::LengthMismatch { left: 1, right: 2 })
        ));
        assert!(matches!(
            g.add_node_attributes("a", &[NodeId(9)], &["1"]),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(g.node_attributes("a"), Err(Error::UnknownAttribute(_))));
        g.add_node_attributes("a", &[NodeId(0)], &["1"]).unwrap();
        g.clear_node_attribute("a").unwrap();
        assert!(matches!(g.clear_node_attribute("a"), Err(Error::UnknownAttribute(_))));
    }

    #[test]
    fn clearing_cost_sets() {
        let mut g = triangle();
        g.add_edge(NodeId(0), NodeId(1), 1.0, "Energy").unwrap();
        g.clear_cost_set("Energy").unwrap();
        assert!(!g.has_cost_set("Energy"));
        assert!(!g.is_frozen());
        assert!(matches!(g.clear_cost_set("Energy"), Err(Error::NoCost(_))));
        assert!(matches!(g.clear_cost_set(""), Err(Error::InvalidCostOperation(_))));
    }

    #[test]
    fn lists_and_json() {
        let g = triangle();
        let (nodes, edges) = g.to_lists();
        assert_eq!(nodes.len(), 3);
        assert_eq!(
            edges,
            vec![
                EdgeRecord { parent: NodeId(0), child: NodeId(1), cost: 100.0 },
                EdgeRecord { parent: NodeId(0), child: NodeId(2), cost: 50.0 },
                EdgeRecord { parent: NodeId(1), child: NodeId(2), cost: 20.0 },
            ]
        );
        let json: serde_json::Value = serde_json::from_str(&g.to_json().unwrap()).unwrap();
        assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(json["edges"][1]["cost"], 50.0);
    }

    #[test]
    fn reopening_requires_no_alternate_sets() {
        let g = triangle();
        let mut m = g.into_mutable().unwrap();
        let d = m.add_node(Point3::new(3.0, 0.0, 0.0), StepType::Flat);
        m.add_edge(NodeId(2), d, 1.0).unwrap();
        let mut g = m.compress();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 4);

        g.add_edge(NodeId(0), NodeId(1), 1.0, "Energy").unwrap();
        let g = g.into_mutable().unwrap_err();
        assert!(g.is_frozen());
        assert!((*g).clear().is_empty());
    }

    #[test]
    fn closest_node_on_selected_axes() {
        let mut m = MutableGraph::new();
        m.add_node(Point3::new(0.0, 0.0, 5.0), StepType::Flat);
        m.add_node(Point3::new(2.0, 0.0, 0.0), StepType::Flat);
        let g = m.compress();
        let probe = Point3::new(0.5, 0.0, 0.0);
        assert_eq!(g.closest_node(probe, [true, true, true]), Some(NodeId(1)));
        assert_eq!(g.closest_node(probe, [true, true, false]), Some(NodeId(0)));
    }
}
