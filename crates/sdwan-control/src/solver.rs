//! Path Solver: turns a topology snapshot into a hysteresis-gated route
//! list for one source agent.

use std::collections::HashMap;
use std::sync::Mutex;

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};

use sdwan_common::models::{Route, RouteReason, DIRECT};
use sdwan_common::SdwanError;

use crate::topology::TopologyEntry;

fn link_cost(rtt_ms: Option<f64>, loss_rate: f64, penalty_factor: f64) -> f64 {
    match rtt_ms {
        Some(rtt) => rtt + loss_rate * penalty_factor,
        None => f64::INFINITY,
    }
}

/// Builds a weighted directed graph from a topology snapshot and computes
/// per-source routes subject to hysteresis. `+inf`-cost links are left
/// out of the graph entirely (equivalent to being present but never
/// selectable), while both endpoints of every link are still added as
/// nodes so a silent relay target is still reachable.
pub struct PathSolver {
    penalty_factor: f64,
    hysteresis_fraction: f64,
    cost_history: Mutex<HashMap<(String, String), f64>>,
}

impl PathSolver {
    pub fn new(penalty_factor: f64, hysteresis_fraction: f64) -> Self {
        Self {
            penalty_factor,
            hysteresis_fraction,
            cost_history: Mutex::new(HashMap::new()),
        }
    }

    fn build_graph(
        &self,
        topology: &HashMap<String, TopologyEntry>,
    ) -> (DiGraph<String, f64>, HashMap<String, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        let node_for = |graph: &mut DiGraph<String, f64>,
                        nodes: &mut HashMap<String, NodeIndex>,
                        id: &str| {
            *nodes
                .entry(id.to_string())
                .or_insert_with(|| graph.add_node(id.to_string()))
        };

        for (source, entry) in topology {
            let source_idx = node_for(&mut graph, &mut nodes, source);
            for (target, metric) in &entry.metrics {
                let target_idx = node_for(&mut graph, &mut nodes, target);
                let cost = link_cost(metric.rtt_ms, metric.loss_rate, self.penalty_factor);
                if cost.is_finite() {
                    graph.add_edge(source_idx, target_idx, cost);
                }
            }
        }
        (graph, nodes)
    }

    /// Computes the route list for `source_agent` given the full topology
    /// snapshot. Returns an empty list if the source has never reported.
    pub fn compute_routes_for(
        &self,
        source_agent: &str,
        topology: &HashMap<String, TopologyEntry>,
    ) -> Vec<Route> {
        let (graph, nodes) = self.build_graph(topology);
        let Some(&source_idx) = nodes.get(source_agent) else {
            return vec![];
        };

        let mut history = self.cost_history.lock().unwrap();
        let mut routes = Vec::new();

        for (target, &target_idx) in &nodes {
            if target == source_agent {
                continue;
            }
            let found = astar(
                &graph,
                source_idx,
                |n| n == target_idx,
                |e| *e.weight(),
                |_| 0.0,
            );
            let Some((cost, path)) = found.filter(|(_, path)| path.len() >= 2) else {
                let no_path = SdwanError::NoPath {
                    destination: target.clone(),
                };
                tracing::trace!(error = %no_path, "no path to destination");
                continue;
            };

            let key = (source_agent.to_string(), target.clone());
            let previous = history.get(&key).copied().unwrap_or(f64::INFINITY);
            if cost >= (1.0 - self.hysteresis_fraction) * previous {
                continue;
            }
            history.insert(key, cost);

            let (next_hop, reason) = if path.len() == 2 {
                (DIRECT.to_string(), RouteReason::Default)
            } else {
                let next = &graph[path[1]];
                (next.clone(), RouteReason::OptimizedPath)
            };

            routes.push(Route {
                dst_cidr: format!("{target}/32"),
                next_hop,
                reason,
            });
        }
        routes
    }

    pub fn reset_history(&self) {
        self.cost_history.lock().unwrap().clear();
    }

    pub fn cost_history(&self) -> HashMap<(String, String), f64> {
        self.cost_history.lock().unwrap().clone()
    }
}
