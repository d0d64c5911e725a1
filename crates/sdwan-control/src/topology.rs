//! Topology Store: the controller's in-memory view of what every agent
//! last reported.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use sdwan_common::models::Metric;

#[derive(Debug, Clone)]
pub struct TopologyEntry {
    pub timestamp: i64,
    pub metrics: HashMap<String, Metric>,
}

/// Guards a single `HashMap` behind a mutex; every accessor and mutator
/// takes the lock, matching the single-writer model the reconciler on the
/// agent side assumes for the forwarding table.
#[derive(Default)]
pub struct TopologyStore {
    data: Mutex<HashMap<String, TopologyEntry>>,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally overwrites the entry for `agent_id`.
    pub fn store(&self, agent_id: &str, timestamp: i64, metrics: &[Metric]) {
        let metrics = metrics
            .iter()
            .map(|m| (m.target_ip.clone(), m.clone()))
            .collect();
        let mut data = self.data.lock().unwrap();
        data.insert(agent_id.to_string(), TopologyEntry { timestamp, metrics });
    }

    pub fn exists(&self, agent_id: &str) -> bool {
        self.data.lock().unwrap().contains_key(agent_id)
    }

    pub fn get(&self, agent_id: &str) -> Option<TopologyEntry> {
        self.data.lock().unwrap().get(agent_id).cloned()
    }

    /// Returns a deep copy of the entire topology; mutating it never
    /// affects subsequently stored or read entries.
    pub fn get_all(&self) -> HashMap<String, TopologyEntry> {
        self.data.lock().unwrap().clone()
    }

    /// Evicts entries older than `max_age_s` relative to wall-clock now
    /// and returns the evicted agent ids.
    pub fn remove_stale(&self, max_age_s: u64) -> Vec<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let mut data = self.data.lock().unwrap();
        let stale: Vec<String> = data
            .iter()
            .filter(|(_, entry)| now - entry.timestamp > max_age_s as i64)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            data.remove(id);
        }
        stale
    }

    pub fn clear(&self) {
        self.data.lock().unwrap().clear();
    }

    pub fn count(&self) -> usize {
        self.data.lock().unwrap().len()
    }
}
