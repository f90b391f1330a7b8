//! Partitioning: which assets ship privately with one map and which go to
//! a game's shared archives.

use std::collections::HashSet;

use crate::graph::{DirectedGraph, VertexId};
use crate::{AssetData, AssetGraph, AssetType};

#[derive(Clone, Copy, Debug)]
enum Direction {
    Out,
    In,
}

/// The one traversal primitive behind reference counting, per-map
/// collection and common collection. Depth-first over `direction` edges
/// from `seeds`; `visit` returns whether to expand a vertex's neighbors.
/// The caller-owned visited set guarantees termination on cycles and lets
/// call sites share visited state across several walks.
fn traverse<F>(
    graph: &DirectedGraph<AssetData>,
    seeds: &[VertexId],
    direction: Direction,
    visited: &mut HashSet<VertexId>,
    visit: &mut F,
) where
    F: FnMut(VertexId) -> bool,
{
    let mut stack: Vec<VertexId> = seeds.iter().rev().copied().collect();
    while let Some(v) = stack.pop() {
        if !visited.insert(v) {
            continue;
        }
        if !visit(v) {
            continue;
        }
        let neighbors = match direction {
            Direction::Out => graph.out_neighbors(v),
            Direction::In => graph.in_neighbors(v),
        };
        for &n in neighbors.iter().rev() {
            if !visited.contains(&n) {
                stack.push(n);
            }
        }
    }
}

impl AssetGraph {
    /// How many distinct maps reach `v` through inbound edges, restricted
    /// to `scope`'s maps when given. The walk stops at map vertices; maps
    /// do not reference each other through content.
    pub fn map_reference_count(&self, v: VertexId, scope: Option<&str>) -> usize {
        let graph = self.graph();
        let mut count = 0usize;
        let mut visited = HashSet::new();
        visited.insert(v);
        traverse(
            graph,
            graph.in_neighbors(v),
            Direction::In,
            &mut visited,
            &mut |n| {
                let data = graph.data(n);
                if data.asset_type == AssetType::Map {
                    if scope.map_or(true, |game| data.game == game) {
                        count += 1;
                    }
                    return false;
                }
                true
            },
        );
        count
    }

    /// Counting scope for an asset: a mod-owned asset counts against that
    /// mod's maps only, a base-game asset against all maps.
    fn count_scope<'a>(&self, asset_game: &'a str) -> Option<&'a str> {
        if asset_game != self.base_game() {
            Some(asset_game)
        } else {
            None
        }
    }

    /// Assets private to one map: the map itself first, then its dependency
    /// closure, cut off wherever an asset is referenced by at least
    /// `threshold` maps (those ship in a shared archive instead). Shaders
    /// carry dependencies but are never materialized.
    pub fn map_assets(&self, map_v: VertexId, threshold: usize) -> Vec<VertexId> {
        let graph = self.graph();
        let mut verts = vec![map_v];
        let mut visited = HashSet::new();
        visited.insert(map_v);
        let seeds = graph.out_neighbors(map_v).to_vec();
        traverse(graph, &seeds, Direction::Out, &mut visited, &mut |v| {
            let data = graph.data(v);
            let scope = self.count_scope(&data.game);
            if self.map_reference_count(v, scope) >= threshold {
                return false;
            }
            if data.asset_type != AssetType::Shader {
                verts.push(v);
            }
            true
        });
        verts
    }

    /// Assets for a game's shared archives: everything the game owns that
    /// is referenced by at least `threshold` maps or matches the scope
    /// whitelist, plus the full dependency closure of each (no further
    /// thresholding below the root). The complement of the per-map sets.
    pub fn common_assets(&self, game: &str, threshold: usize) -> Vec<VertexId> {
        let graph = self.graph();
        let scope = self.count_scope(game);
        let whitelist = graph
            .vertex(game)
            .and_then(|scope_v| graph.data(scope_v).whitelist.clone());
        let mut verts = Vec::new();
        let mut visited = HashSet::new();
        for v in graph.vertex_ids() {
            let data = graph.data(v);
            if data.game != game || data.asset_type == AssetType::GameScope {
                continue;
            }
            let whitelisted = whitelist
                .as_ref()
                .is_some_and(|w| w.matches(graph.id(v)));
            if !whitelisted && self.map_reference_count(v, scope) < threshold {
                continue;
            }
            traverse(graph, &[v], Direction::Out, &mut visited, &mut |n| {
                if graph.data(n).asset_type != AssetType::Shader {
                    verts.push(n);
                }
                true
            });
        }
        verts
    }
}
