// Dijkstra shortest paths over a compressed graph.
//
// Every query reads one named cost set through a `CsrView` and never
// mutates the graph. Edges without a cost in the chosen set are invisible,
// and self-loops are ignored.
//
// The search uses a `BinaryHeap` min-heap (reversed ordering, ties broken
// by node id) with scores and came-from data in `Vec`s indexed by `NodeId`.
// Multi-pair and all-pairs queries run one independent search per source
// on the rayon pool.
//
// See also: `graph.rs` for `CompressedGraph`/`CsrView`.
//
// **Critical constraint: determinism.** Results depend only on the graph
// and the query. Relaxation is strict (`<`), so among equal-cost routes the
// one reached first in (cost, node id) order wins, for every query shape.

use crate::error::{Error, Result};
use crate::graph::{CompressedGraph, CsrView};
use crate::types::NodeId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One step of a path: a node and the cost of the edge leaving it. The
/// last member's cost is 0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathMember {
    pub cost_to_next: f32,
    pub node: NodeId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub members: Vec<PathMember>,
}

impl Path {
    pub fn total_cost(&self) -> f32 {
        self.members.iter().map(|m| m.cost_to_next).sum()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members.iter().map(|m| m.node)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Dense all-pairs form, row-major by source.
#[derive(Clone, Debug, PartialEq)]
pub struct DistancePredecessor {
    pub node_count: usize,
    /// Path cost from `i` to `j`; 0 on the diagonal, -1 when unreachable.
    pub distance: Vec<f32>,
    /// Node before `j` on the path from `i`; -1 on the diagonal or when
    /// unreachable.
    pub predecessor: Vec<i64>,
}

impl DistancePredecessor {
    pub fn distance(&self, from: NodeId, to: NodeId) -> Option<f32> {
        let d = self.distance[from.index() * self.node_count + to.index()];
        (d >= 0.0).then_some(d)
    }

    pub fn predecessor(&self, from: NodeId, to: NodeId) -> Option<NodeId> {
        let p = self.predecessor[from.index() * self.node_count + to.index()];
        u32::try_from(p).ok().map(NodeId)
    }
}

/// Entry in the open set (min-heap via reversed ordering).
struct OpenEntry {
    node: NodeId,
    cost: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost.total_cmp(&other.cost) == Ordering::Equal && self.node == other.node
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest cost is "greatest".
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.0.cmp(&self.node.0))
    }
}

/// Result of a single-source search.
struct SearchTree {
    dist: Vec<f32>,
    /// `came_from[node] = (previous node, cost of the edge used)`.
    came_from: Vec<Option<(NodeId, f32)>>,
}

impl SearchTree {
    fn path_to(&self, start: NodeId, goal: NodeId) -> Option<Path> {
        if start != goal && self.came_from[goal.index()].is_none() {
            return None;
        }
        let mut members = vec![PathMember {
            cost_to_next: 0.0,
            node: goal,
        }];
        let mut current = goal;
        while current != start {
            let (prev, cost) = self.came_from[current.index()]?;
            members.push(PathMember {
                cost_to_next: cost,
                node: prev,
            });
            current = prev;
        }
        members.reverse();
        Some(Path { members })
    }
}

/// Dijkstra from `start`. Stops early once `goal` is settled.
fn search(csr: CsrView<'_>, start: NodeId, goal: Option<NodeId>) -> SearchTree {
    let n = csr.node_count();
    let mut dist = vec![f32::INFINITY; n];
    let mut came_from: Vec<Option<(NodeId, f32)>> = vec![None; n];
    let mut closed = vec![false; n];

    dist[start.index()] = 0.0;
    let mut open = BinaryHeap::new();
    open.push(OpenEntry {
        node: start,
        cost: 0.0,
    });

    while let Some(current) = open.pop() {
        let ci = current.node.index();
        if closed[ci] {
            continue;
        }
        closed[ci] = true;
        if Some(current.node) == goal {
            break;
        }

        for (neighbor, cost) in csr.row(current.node) {
            let ni = neighbor.index();
            if ni == ci || closed[ni] {
                continue;
            }
            let tentative = dist[ci] + cost;
            if tentative < dist[ni] {
                dist[ni] = tentative;
                came_from[ni] = Some((current.node, cost));
                open.push(OpenEntry {
                    node: neighbor,
                    cost: tentative,
                });
            }
        }
    }

    SearchTree { dist, came_from }
}

fn check_node(graph: &CompressedGraph, id: NodeId) -> Result<()> {
    if id.index() < graph.node_count() {
        Ok(())
    } else {
        Err(Error::OutOfRange {
            id,
            len: graph.node_count(),
        })
    }
}

/// Cheapest path from `start` to `end` under `cost_set` (`""` for the
/// default). A node's path to itself is the single member `(0, node)`.
pub fn shortest_path(
    graph: &CompressedGraph,
    start: NodeId,
    end: NodeId,
    cost_set: &str,
) -> Result<Path> {
    let csr = graph.compress(cost_set)?;
    check_node(graph, start)?;
    check_node(graph, end)?;
    search(csr, start, Some(end))
        .path_to(start, end)
        .ok_or(Error::NoPath { start, end })
}

/// Independent `shortest_path` per `(starts[i], ends[i])`; `None` where
/// unreachable.
pub fn shortest_paths(
    graph: &CompressedGraph,
    starts: &[NodeId],
    ends: &[NodeId],
    cost_set: &str,
) -> Result<Vec<Option<Path>>> {
    if starts.len() != ends.len() {
        return Err(Error::LengthMismatch {
            left: starts.len(),
            right: ends.len(),
        });
    }
    let csr = graph.compress(cost_set)?;
    for &id in starts.iter().chain(ends) {
        check_node(graph, id)?;
    }
    Ok(starts
        .par_iter()
        .zip(ends)
        .map(|(&s, &e)| search(csr, s, Some(e)).path_to(s, e))
        .collect())
}

/// Every `shortest_path(i, j)`, at index `i * N + j`.
pub fn all_pairs(graph: &CompressedGraph, cost_set: &str) -> Result<Vec<Option<Path>>> {
    let csr = graph.compress(cost_set)?;
    let n = graph.node_count();
    let rows: Vec<Vec<Option<Path>>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let start = NodeId(i as u32);
            let tree = search(csr, start, None);
            (0..n)
                .map(|j| tree.path_to(start, NodeId(j as u32)))
                .collect()
        })
        .collect();
    Ok(rows.concat())
}

/// All-pairs distances and predecessors as dense row-major matrices.
pub fn distance_and_predecessor(graph: &CompressedGraph, cost_set: &str) -> Result<DistancePredecessor> {
    let csr = graph.compress(cost_set)?;
    let n = graph.node_count();
    let rows: Vec<(Vec<f32>, Vec<i64>)> = (0..n)
        .into_par_iter()
        .map(|i| {
            let tree = search(csr, NodeId(i as u32), None);
            let mut distance = Vec::with_capacity(n);
            let mut predecessor = Vec::with_capacity(n);
            for j in 0..n {
                if i == j {
                    distance.push(0.0);
                    predecessor.push(-1);
                } else if let Some((prev, _)) = tree.came_from[j] {
                    distance.push(tree.dist[j]);
                    predecessor.push(prev.0 as i64);
                } else {
                    distance.push(-1.0);
                    predecessor.push(-1);
                }
            }
            (distance, predecessor)
        })
        .collect();

    let (distance, predecessor): (Vec<Vec<f32>>, Vec<Vec<i64>>) = rows.into_iter().unzip();
    Ok(DistancePredecessor {
        node_count: n,
        distance: distance.concat(),
        predecessor: predecessor.concat(),
    })
}
