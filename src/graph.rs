//! Constraint graph over per-city pickup/delivery vertices.
//!
//! Every sale `vendor -> buyer` contributes the vertices `vendor+` (pickup)
//! and `buyer-` (delivery) and the precedence edge `vendor+ -> buyer-`.
//! A city appearing in both roles additionally gets the same-city edge
//! `city+ -> city-`: both roles are served during one visit, so the two
//! vertices are fused into a single [`Stop`].
//!
//! The solvers reason on stops. Stop-level precedence edges are the sale
//! edges between distinct cities, which is why two mutual sales
//! (`A -> B` and `B -> A`) form a cycle.

use crate::instance::{City, Sale};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Pickup,
    Delivery,
}

/// A `(city, role)` pair. Vertices only exist as derived from sales.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vertex {
    pub city: City,
    pub role: Role,
}

impl Vertex {
    pub fn pickup(city: City) -> Self {
        Vertex { city, role: Role::Pickup }
    }

    pub fn delivery(city: City) -> Self {
        Vertex { city, role: Role::Delivery }
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::Pickup => write!(f, "{}+", self.city),
            Role::Delivery => write!(f, "{}-", self.city),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// `vendor+ -> buyer-` for a sale.
    Sale,
    /// `city+ -> city-` for a city serving both roles.
    SameCity,
}

/// Directed precedence edge between two vertex indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub kind: EdgeKind,
}

/// One physical visit: the vertices of a single city.
#[derive(Debug, Clone)]
pub struct Stop {
    pub city: City,
    pub pickup: Option<usize>,
    pub delivery: Option<usize>,
}

impl Stop {
    /// Vertex indices served at this stop, pickup first.
    pub fn vertices(&self) -> impl Iterator<Item = usize> {
        self.pickup.into_iter().chain(self.delivery)
    }

    pub fn is_fused(&self) -> bool {
        self.pickup.is_some() && self.delivery.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
    vertices: Vec<Vertex>,
    vertex_index: HashMap<Vertex, usize>,
    edges: Vec<Edge>,
    stops: Vec<Stop>,
    stop_index: HashMap<City, usize>,
    stop_of_vertex: Vec<usize>,
    stop_successors: Vec<Vec<usize>>,
    stop_in_degree: Vec<usize>,
}

impl ConstraintGraph {
    /// Build the graph of a sale list.
    ///
    /// Vertices and stops are numbered by first appearance (vendor, then
    /// buyer, sale by sale). Sales with identical vendor and buyer are
    /// skipped.
    pub fn from_sales<'a, I>(sales: I) -> Self
    where
        I: IntoIterator<Item = &'a Sale>,
    {
        let mut graph = ConstraintGraph::default();

        for sale in sales {
            if !sale.is_well_formed() {
                log::warn!("ignoring sale {} in constraint graph", sale);
                continue;
            }
            let pickup = graph.intern(Vertex::pickup(sale.vendor.clone()));
            let delivery = graph.intern(Vertex::delivery(sale.buyer.clone()));
            graph.add_edge(pickup, delivery, EdgeKind::Sale);
        }

        let fused: Vec<(usize, usize)> = graph
            .stops
            .iter()
            .filter_map(|stop| Some((stop.pickup?, stop.delivery?)))
            .collect();
        for (pickup, delivery) in fused {
            graph.add_edge(pickup, delivery, EdgeKind::SameCity);
        }

        log::debug!(
            "constraint graph: {} vertices, {} edges, {} stops",
            graph.vertices.len(),
            graph.edges.len(),
            graph.stops.len()
        );

        graph
    }

    fn intern(&mut self, vertex: Vertex) -> usize {
        if let Some(&idx) = self.vertex_index.get(&vertex) {
            return idx;
        }

        let idx = self.vertices.len();
        let stop = match self.stop_index.get(&vertex.city) {
            Some(&stop) => stop,
            None => {
                let stop = self.stops.len();
                self.stops.push(Stop {
                    city: vertex.city.clone(),
                    pickup: None,
                    delivery: None,
                });
                self.stop_index.insert(vertex.city.clone(), stop);
                self.stop_successors.push(Vec::new());
                self.stop_in_degree.push(0);
                stop
            }
        };

        match vertex.role {
            Role::Pickup => self.stops[stop].pickup = Some(idx),
            Role::Delivery => self.stops[stop].delivery = Some(idx),
        }
        self.stop_of_vertex.push(stop);
        self.vertex_index.insert(vertex.clone(), idx);
        self.vertices.push(vertex);
        idx
    }

    fn add_edge(&mut self, from: usize, to: usize, kind: EdgeKind) {
        if self.edges.iter().any(|e| e.from == from && e.to == to) {
            return;
        }
        self.edges.push(Edge { from, to, kind });

        let (a, b) = (self.stop_of_vertex[from], self.stop_of_vertex[to]);
        if a != b && !self.stop_successors[a].contains(&b) {
            self.stop_successors[a].push(b);
            self.stop_in_degree[b] += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex(&self, idx: usize) -> &Vertex {
        &self.vertices[idx]
    }

    pub fn index_of(&self, vertex: &Vertex) -> Option<usize> {
        self.vertex_index.get(vertex).copied()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn stop_of(&self, vertex: usize) -> usize {
        self.stop_of_vertex[vertex]
    }

    /// Stops that may only be visited after `stop`.
    pub fn successors(&self, stop: usize) -> &[usize] {
        &self.stop_successors[stop]
    }

    /// Number of distinct stops that must be visited before `stop`.
    pub fn in_degree(&self, stop: usize) -> usize {
        self.stop_in_degree[stop]
    }

    pub fn out_degree(&self, stop: usize) -> usize {
        self.stop_successors[stop].len()
    }

    /// Vertex order obtained by visiting the given stops in sequence.
    pub fn vertex_order(&self, stops: &[usize]) -> Vec<usize> {
        stops
            .iter()
            .flat_map(|&s| self.stops[s].vertices())
            .collect()
    }

    /// Whether `order` (vertex indices) contains every vertex exactly once
    /// and places the source of every edge before its target.
    pub fn respects_precedence(&self, order: &[usize]) -> bool {
        if order.len() != self.vertices.len() {
            return false;
        }
        let mut position = vec![usize::MAX; self.vertices.len()];
        for (pos, &v) in order.iter().enumerate() {
            if v >= position.len() || position[v] != usize::MAX {
                return false;
            }
            position[v] = pos;
        }
        self.edges.iter().all(|e| position[e.from] < position[e.to])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_independent_sales() {
        let sales = vec![Sale::new("A", "B"), Sale::new("C", "D")];
        let graph = ConstraintGraph::from_sales(&sales);

        assert_eq!(graph.vertices().len(), 4);
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.stops().len(), 4);
        assert_eq!(graph.vertex(0).to_string(), "A+");
        assert_eq!(graph.vertex(1).to_string(), "B-");
        assert_eq!(graph.in_degree(1), 1);
        assert_eq!(graph.out_degree(0), 1);
    }

    #[test]
    fn test_same_city_edge() {
        let sales = vec![Sale::new("A", "B"), Sale::new("B", "C")];
        let graph = ConstraintGraph::from_sales(&sales);

        assert_eq!(graph.stops().len(), 3);
        let b = &graph.stops()[1];
        assert!(b.is_fused());
        assert!(graph
            .edges()
            .iter()
            .any(|e| e.kind == EdgeKind::SameCity && graph.vertex(e.from).city == City::from("B")));
        assert_eq!(graph.successors(0), &[1]);
        assert_eq!(graph.successors(1), &[2]);
    }

    #[test]
    fn test_duplicate_sales_share_edges() {
        let sales = vec![Sale::new("A", "B"), Sale::new("A", "B")];
        let graph = ConstraintGraph::from_sales(&sales);
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.in_degree(1), 1);
    }

    #[test]
    fn test_empty_sales() {
        let graph = ConstraintGraph::from_sales(&Vec::<Sale>::new());
        assert!(graph.is_empty());
        assert!(graph.stops().is_empty());
        assert!(graph.respects_precedence(&[]));
    }

    #[test]
    fn test_respects_precedence() {
        let sales = vec![Sale::new("A", "B")];
        let graph = ConstraintGraph::from_sales(&sales);
        assert!(graph.respects_precedence(&[0, 1]));
        assert!(!graph.respects_precedence(&[1, 0]));
        assert!(!graph.respects_precedence(&[0]));
    }

    #[test]
    fn test_malformed_sale_ignored() {
        let sales = vec![Sale::new("A", "A"), Sale::new("A", "B")];
        let graph = ConstraintGraph::from_sales(&sales);
        assert_eq!(graph.vertices().len(), 2);
        assert_eq!(graph.edges().len(), 1);
    }
}
