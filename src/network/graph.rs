use geo::{Coord, Distance, Haversine, Point};
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;

use super::NetworkError;

/// An OpenStreetMap node kept in the routable graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub osm_id: i64,
    /// longitude
    pub x: f64,
    /// latitude
    pub y: f64,
}

impl NetworkNode {
    pub fn coord(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }

    pub fn point(&self) -> Point<f64> {
        Point::new(self.x, self.y)
    }
}

/// A directed, traversable street piece between two OSM nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub from: i64,
    pub to: i64,
    /// meters
    pub length: f64,
}

impl NetworkEdge {
    /// Edge from `a` to `b` weighted by their great-circle distance.
    pub fn between(a: &NetworkNode, b: &NetworkNode) -> Self {
        Self {
            from: a.osm_id,
            to: b.osm_id,
            length: Haversine.distance(a.point(), b.point()),
        }
    }
}

/// Serializable node/edge lists for caching a built graph on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub place: String,
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
}

type IndexedNode = GeomWithData<[f64; 2], NodeIndex>;

/// Routable street network with nearest-node lookup.
///
/// Nearest-node queries run on an R-tree whose longitudes are scaled by the
/// cosine of the mean latitude, so distances are approximately metric at
/// city scale.
pub struct StreetGraph {
    graph: DiGraph<NetworkNode, f64>,
    by_osm_id: HashMap<i64, NodeIndex>,
    lon_scale: f64,
    spatial: RTree<IndexedNode>,
}

impl StreetGraph {
    /// Builds the graph. Duplicate node ids keep their first occurrence.
    ///
    /// # Errors
    ///
    /// [`NetworkError::UnknownNode`] if an edge names a node not in `nodes`.
    pub fn new(nodes: Vec<NetworkNode>, edges: Vec<NetworkEdge>) -> Result<Self, NetworkError> {
        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut by_osm_id = HashMap::with_capacity(nodes.len());

        for node in nodes {
            by_osm_id
                .entry(node.osm_id)
                .or_insert_with(|| graph.add_node(node));
        }

        for edge in edges {
            let from = *by_osm_id
                .get(&edge.from)
                .ok_or(NetworkError::UnknownNode(edge.from))?;
            let to = *by_osm_id
                .get(&edge.to)
                .ok_or(NetworkError::UnknownNode(edge.to))?;
            graph.add_edge(from, to, edge.length);
        }

        Ok(Self::index(graph))
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, NetworkError> {
        Self::new(snapshot.nodes, snapshot.edges)
    }

    fn index(graph: DiGraph<NetworkNode, f64>) -> Self {
        let by_osm_id = graph
            .node_indices()
            .map(|i| (graph[i].osm_id, i))
            .collect();

        let lon_scale = if graph.node_count() == 0 {
            1.0
        } else {
            let mean_lat =
                graph.node_weights().map(|n| n.y).sum::<f64>() / graph.node_count() as f64;
            mean_lat.to_radians().cos()
        };

        let entries = graph
            .node_indices()
            .map(|i| {
                let n = &graph[i];
                GeomWithData::new([n.x * lon_scale, n.y], i)
            })
            .collect();

        Self {
            graph,
            by_osm_id,
            lon_scale,
            spatial: RTree::bulk_load(entries),
        }
    }

    /// Keeps only the largest weakly connected component.
    pub fn largest_component(self) -> Self {
        let count = self.graph.node_count();
        if count == 0 {
            return self;
        }

        let mut components = UnionFind::new(count);
        for edge in self.graph.edge_references() {
            components.union(edge.source().index(), edge.target().index());
        }
        let labels = components.into_labeling();

        let mut sizes: HashMap<usize, usize> = HashMap::new();
        for label in &labels {
            *sizes.entry(*label).or_default() += 1;
        }
        let Some((largest, _)) = sizes
            .into_iter()
            .max_by_key(|&(label, size)| (size, Reverse(label)))
        else {
            return self;
        };

        let graph = self.graph.filter_map(
            |i, node| (labels[i.index()] == largest).then_some(*node),
            |_, length| Some(*length),
        );
        Self::index(graph)
    }

    /// The node closest to `point` (x = longitude, y = latitude).
    pub fn nearest_node(&self, point: Point<f64>) -> Option<NodeIndex> {
        self.spatial
            .nearest_neighbor(&[point.x() * self.lon_scale, point.y()])
            .map(|entry| entry.data)
    }

    /// Length-weighted shortest path, endpoints included.
    pub fn shortest_path(&self, from: NodeIndex, to: NodeIndex) -> Option<Vec<NodeIndex>> {
        let goal = self.graph.node_weight(to)?.point();
        self.graph.node_weight(from)?;
        astar(
            &self.graph,
            from,
            |n| n == to,
            |e| *e.weight(),
            |n| Haversine.distance(self.graph[n].point(), goal),
        )
        .map(|(_, path)| path)
    }

    pub fn node(&self, index: NodeIndex) -> Option<&NetworkNode> {
        self.graph.node_weight(index)
    }

    pub fn find_osm_node(&self, osm_id: i64) -> Option<NodeIndex> {
        self.by_osm_id.get(&osm_id).copied()
    }

    /// Coordinates of `path`, in order.
    pub fn path_coords(&self, path: &[NodeIndex]) -> Vec<Coord<f64>> {
        path.iter()
            .filter_map(|i| self.node(*i).map(NetworkNode::coord))
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NetworkNode> {
        self.graph.node_weights()
    }

    /// Every directed edge as a (start, end) coordinate pair.
    pub fn edge_lines(&self) -> impl Iterator<Item = (Coord<f64>, Coord<f64>)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()].coord(), self.graph[e.target()].coord()))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn snapshot(&self, place: &str) -> GraphSnapshot {
        GraphSnapshot {
            place: place.to_string(),
            nodes: self.graph.node_weights().copied().collect(),
            edges: self
                .graph
                .edge_references()
                .map(|e| NetworkEdge {
                    from: self.graph[e.source()].osm_id,
                    to: self.graph[e.target()].osm_id,
                    length: *e.weight(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for StreetGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreetGraph")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn node(osm_id: i64, x: f64, y: f64) -> NetworkNode {
        NetworkNode { osm_id, x, y }
    }

    /// Two-way street through `nodes` in order.
    pub fn two_way(nodes: &[NetworkNode]) -> Vec<NetworkEdge> {
        nodes
            .windows(2)
            .flat_map(|w| [NetworkEdge::between(&w[0], &w[1]), NetworkEdge::between(&w[1], &w[0])])
            .collect()
    }

    /// Five nodes from (3.88, 43.61) to (3.90, 43.62), two-way.
    pub fn line_graph() -> StreetGraph {
        let nodes = vec![
            node(100, 3.88, 43.61),
            node(101, 3.885, 43.6125),
            node(102, 3.89, 43.615),
            node(103, 3.895, 43.6175),
            node(104, 3.90, 43.62),
        ];
        let edges = two_way(&nodes);
        StreetGraph::new(nodes, edges).unwrap()
    }
}
