//! Shared application state.

use std::sync::Arc;

use sdwan_common::config::ControllerConfig;

use crate::solver::PathSolver;
use crate::topology::TopologyStore;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    topology: TopologyStore,
    solver: PathSolver,
}

impl AppState {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                topology: TopologyStore::new(),
                solver: PathSolver::new(
                    config.algorithm.penalty_factor,
                    config.algorithm.hysteresis_fraction,
                ),
            }),
        }
    }

    pub fn topology(&self) -> &TopologyStore {
        &self.inner.topology
    }

    pub fn solver(&self) -> &PathSolver {
        &self.inner.solver
    }
}
