use std::collections::HashMap;

/// Index of a vertex in a [`DirectedGraph`] arena. Stable for the lifetime
/// of the graph; vertices are never removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(u32);

impl VertexId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Vertex<T> {
    id: String,
    data: T,
    out_edges: Vec<VertexId>,
    in_edges: Vec<VertexId>,
}

/// Mutable directed graph with string-keyed vertices.
///
/// Vertex and edge insertion are idempotent. Cycles are tolerated; callers
/// that traverse the graph guard with a visited set.
#[derive(Debug, Default)]
pub struct DirectedGraph<T> {
    vertices: Vec<Vertex<T>>,
    lookup: HashMap<String, VertexId>,
}

impl<T> DirectedGraph<T> {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Adds a vertex, or returns the existing one with its data unchanged.
    pub fn add_vertex(&mut self, id: &str, data: T) -> VertexId {
        if let Some(&existing) = self.lookup.get(id) {
            return existing;
        }
        let vertex_id = VertexId(self.vertices.len() as u32);
        self.vertices.push(Vertex {
            id: id.to_string(),
            data,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
        });
        self.lookup.insert(id.to_string(), vertex_id);
        vertex_id
    }

    pub fn vertex(&self, id: &str) -> Option<VertexId> {
        self.lookup.get(id).copied()
    }

    pub fn id(&self, v: VertexId) -> &str {
        &self.vertices[v.index()].id
    }

    pub fn data(&self, v: VertexId) -> &T {
        &self.vertices[v.index()].data
    }

    pub fn data_mut(&mut self, v: VertexId) -> &mut T {
        &mut self.vertices[v.index()].data
    }

    /// Adds a directed edge a -> b. At most one edge exists per ordered
    /// pair; re-insertion is a no-op. Returns whether an edge was added.
    pub fn add_edge(&mut self, a: VertexId, b: VertexId) -> bool {
        if self.vertices[a.index()].out_edges.contains(&b) {
            return false;
        }
        self.vertices[a.index()].out_edges.push(b);
        self.vertices[b.index()].in_edges.push(a);
        true
    }

    /// Removes the edge a -> b if present. Returns whether an edge was
    /// removed.
    pub fn remove_edge(&mut self, a: VertexId, b: VertexId) -> bool {
        let out_edges = &mut self.vertices[a.index()].out_edges;
        let Some(out_pos) = out_edges.iter().position(|&v| v == b) else {
            return false;
        };
        out_edges.remove(out_pos);
        let in_edges = &mut self.vertices[b.index()].in_edges;
        if let Some(in_pos) = in_edges.iter().position(|&v| v == a) {
            in_edges.remove(in_pos);
        }
        true
    }

    pub fn out_neighbors(&self, v: VertexId) -> &[VertexId] {
        &self.vertices[v.index()].out_edges
    }

    pub fn in_neighbors(&self, v: VertexId) -> &[VertexId] {
        &self.vertices[v.index()].in_edges
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertices.len() as u32).map(VertexId)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.vertices.iter().map(|v| v.out_edges.len()).sum()
    }
}
