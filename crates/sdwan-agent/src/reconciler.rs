//! Route Reconciler: diffs the desired route set against the kernel
//! forwarding table and applies the minimal set of changes.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::IpNet;
use sdwan_common::models::{Route, DIRECT};
use sdwan_common::SdwanError;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Destination -> next-hop ("direct" or a peer address).
pub type RouteTable = HashMap<String, String>;

#[derive(Debug, Default, Clone)]
pub struct DiffResult {
    pub add: RouteTable,
    pub modify: RouteTable,
    pub delete: Vec<String>,
}

/// Abstracts the forwarding-table interface so the reconciler is testable
/// without shelling out. The production implementation shells out to the
/// system `ip` binary.
#[async_trait]
pub trait RouteCommand: Send + Sync {
    /// Returns every host route currently bound to the configured interface.
    async fn read_current(&self) -> RouteTable;

    /// Idempotent add-or-update of a host route via the given next-hop.
    async fn replace(&self, dst_ip: &str, next_hop: &str) -> Result<(), SdwanError>;

    /// Removes a host route. A "route does not exist" failure counts as success.
    async fn delete(&self, dst_ip: &str) -> Result<(), SdwanError>;
}

/// Shells out to the system `ip` binary, matching the subprocess style the
/// rest of the agent uses for external system mutation.
pub struct IpRouteCommand {
    interface: String,
}

impl IpRouteCommand {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    async fn run(&self, args: Vec<String>) -> std::io::Result<std::process::Output> {
        tokio::time::timeout(
            COMMAND_TIMEOUT,
            tokio::task::spawn_blocking(move || std::process::Command::new("ip").args(&args).output()),
        )
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "ip route command timed out"))?
        .map_err(|e| std::io::Error::other(e.to_string()))?
    }
}

#[async_trait]
impl RouteCommand for IpRouteCommand {
    async fn read_current(&self) -> RouteTable {
        let iface = self.interface.clone();
        let output = tokio::time::timeout(
            COMMAND_TIMEOUT,
            tokio::task::spawn_blocking(|| {
                std::process::Command::new("ip")
                    .args(["route", "show", "table", "main"])
                    .output()
            }),
        )
        .await;

        let output = match output {
            Ok(Ok(Ok(output))) if output.status.success() => output,
            _ => return RouteTable::new(),
        };

        parse_route_table(&String::from_utf8_lossy(&output.stdout), &iface)
    }

    async fn replace(&self, dst_ip: &str, next_hop: &str) -> Result<(), SdwanError> {
        let args = vec![
            "route".into(),
            "replace".into(),
            format!("{dst_ip}/32"),
            "via".into(),
            next_hop.into(),
            "dev".into(),
            self.interface.clone(),
        ];
        match self.run(args).await {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(SdwanError::ForwardingCommandFailure(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
            Err(e) => Err(SdwanError::ForwardingCommandFailure(e.to_string())),
        }
    }

    async fn delete(&self, dst_ip: &str) -> Result<(), SdwanError> {
        let args = vec![
            "route".into(),
            "del".into(),
            format!("{dst_ip}/32"),
            "dev".into(),
            self.interface.clone(),
        ];
        match self.run(args).await {
            // A missing route is fine to delete; ip reports non-zero in
            // that case but there is nothing left for us to do.
            Ok(_) | Err(_) => Ok(()),
        }
    }
}

fn parse_route_table(stdout: &str, interface: &str) -> RouteTable {
    let mut table = RouteTable::new();
    for line in stdout.lines() {
        if !line.contains(interface) {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        let dst_field = parts[0];
        let (dst, is_host) = match dst_field.split_once('/') {
            Some((addr, "32")) => (addr, true),
            Some(_) => (dst_field, false),
            None => (dst_field, true),
        };
        if !is_host || dst.parse::<IpAddr>().is_err() {
            continue;
        }
        let next_hop = parts
            .iter()
            .position(|p| *p == "via")
            .and_then(|i| parts.get(i + 1))
            .map(|s| s.to_string())
            .unwrap_or_else(|| DIRECT.to_string());
        table.insert(dst.to_string(), next_hop);
    }
    table
}

/// Computes the minimal ADD/MODIFY/DELETE set to move `current` to `desired`.
pub fn diff(desired: &RouteTable, current: &RouteTable) -> DiffResult {
    let mut result = DiffResult::default();
    for (dst, next_hop) in desired {
        match current.get(dst) {
            None => {
                result.add.insert(dst.clone(), next_hop.clone());
            }
            Some(existing) if existing != next_hop => {
                result.modify.insert(dst.clone(), next_hop.clone());
            }
            Some(_) => {}
        }
    }
    for dst in current.keys() {
        if !desired.contains_key(dst) {
            result.delete.push(dst.clone());
        }
    }
    result
}

/// Owns the allowed overlay subnet and applies diffs through a `RouteCommand`.
pub struct Reconciler {
    command: Box<dyn RouteCommand>,
    allowed_subnet: IpNet,
}

impl Reconciler {
    pub fn new(command: Box<dyn RouteCommand>, allowed_subnet: IpNet) -> Self {
        Self {
            command,
            allowed_subnet,
        }
    }

    fn in_subnet(&self, addr: &str) -> bool {
        addr.parse::<IpAddr>()
            .map(|ip| self.allowed_subnet.contains(&ip))
            .unwrap_or(false)
    }

    /// Applies one route. A destination or non-"direct" next-hop outside
    /// the allowed subnet is rejected without issuing any command.
    pub async fn apply(&self, dst: &str, next_hop: &str) -> Result<(), SdwanError> {
        if !self.in_subnet(dst) {
            return Err(SdwanError::SubnetViolation {
                address: dst.to_string(),
            });
        }
        if next_hop == DIRECT {
            return self.command.delete(dst).await;
        }
        if !self.in_subnet(next_hop) {
            return Err(SdwanError::SubnetViolation {
                address: next_hop.to_string(),
            });
        }
        self.command.replace(dst, next_hop).await
    }

    /// Reconciles the forwarding table to the desired route set. Applies
    /// ADD, then MODIFY, then DELETE; individual failures are logged and
    /// do not abort the pass.
    pub async fn sync(&self, routes: &[Route]) -> bool {
        let mut desired = RouteTable::new();
        for route in routes {
            let dst = route.dst_cidr.trim_end_matches("/32").to_string();
            let next_hop = if route.is_direct() {
                DIRECT.to_string()
            } else {
                route.next_hop.clone()
            };
            desired.insert(dst, next_hop);
        }
        let current = self.command.read_current().await;
        let plan = diff(&desired, &current);

        let mut all_ok = true;
        for (dst, next_hop) in &plan.add {
            if let Err(e) = self.apply(dst, next_hop).await {
                tracing::warn!(dst = %dst, error = %e, "failed to add route");
                all_ok = false;
            }
        }
        for (dst, next_hop) in &plan.modify {
            if let Err(e) = self.apply(dst, next_hop).await {
                tracing::warn!(dst = %dst, error = %e, "failed to modify route");
                all_ok = false;
            }
        }
        for dst in &plan.delete {
            if let Err(e) = self.apply(dst, DIRECT).await {
                tracing::warn!(dst = %dst, error = %e, "failed to delete route");
                all_ok = false;
            }
        }
        tracing::info!(
            added = plan.add.len(),
            modified = plan.modify.len(),
            deleted = plan.delete.len(),
            "route sync complete"
        );
        all_ok
    }

    /// Drops every overlay route currently installed. Used when entering fallback.
    pub async fn flush_all(&self) -> bool {
        let current = self.command.read_current().await;
        let mut all_ok = true;
        for dst in current.keys() {
            if let Err(e) = self.apply(dst, DIRECT).await {
                tracing::warn!(dst = %dst, error = %e, "failed to flush route");
                all_ok = false;
            }
        }
        all_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn parses_relay_and_direct_routes() {
        let stdout = "\
10.254.0.5 via 10.254.0.3 dev wg0\n\
10.254.0.6 dev wg0\n\
10.254.0.7/24 dev wg0\n\
10.254.0.8 dev eth0\n";
        let table = parse_route_table(stdout, "wg0");
        assert_eq!(table.get("10.254.0.5"), Some(&"10.254.0.3".to_string()));
        assert_eq!(table.get("10.254.0.6"), Some(&DIRECT.to_string()));
        assert!(!table.contains_key("10.254.0.7"));
        assert!(!table.contains_key("10.254.0.8"));
    }

    #[test]
    fn diff_is_disjoint_and_exhaustive() {
        let mut current = RouteTable::new();
        current.insert("10.254.0.5".into(), "direct".into());
        current.insert("10.254.0.9".into(), "direct".into());

        let mut desired = RouteTable::new();
        desired.insert("10.254.0.5".into(), "10.254.0.3".into()); // modify
        desired.insert("10.254.0.6".into(), "direct".into()); // add

        let result = diff(&desired, &current);
        assert_eq!(result.add.get("10.254.0.6"), Some(&"direct".to_string()));
        assert_eq!(
            result.modify.get("10.254.0.5"),
            Some(&"10.254.0.3".to_string())
        );
        assert_eq!(result.delete, vec!["10.254.0.9".to_string()]);
    }

    struct FakeCommand {
        current: RouteTable,
        replaced: StdMutex<Vec<(String, String)>>,
        deleted: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl RouteCommand for FakeCommand {
        async fn read_current(&self) -> RouteTable {
            self.current.clone()
        }

        async fn replace(&self, dst_ip: &str, next_hop: &str) -> Result<(), SdwanError> {
            self.replaced
                .lock()
                .unwrap()
                .push((dst_ip.to_string(), next_hop.to_string()));
            Ok(())
        }

        async fn delete(&self, dst_ip: &str) -> Result<(), SdwanError> {
            self.deleted.lock().unwrap().push(dst_ip.to_string());
            Ok(())
        }
    }

    fn subnet() -> IpNet {
        "10.254.0.0/24".parse().unwrap()
    }

    #[tokio::test]
    async fn rejects_destination_outside_subnet() {
        let fake = FakeCommand {
            current: RouteTable::new(),
            replaced: StdMutex::new(vec![]),
            deleted: StdMutex::new(vec![]),
        };
        let reconciler = Reconciler::new(Box::new(fake), subnet());
        let err = reconciler.apply("192.0.2.1", "direct").await.unwrap_err();
        assert!(matches!(err, SdwanError::SubnetViolation { .. }));
    }

    #[tokio::test]
    async fn sync_applies_add_modify_delete() {
        let mut current = RouteTable::new();
        current.insert("10.254.0.9".into(), "direct".into());
        let fake = FakeCommand {
            current,
            replaced: StdMutex::new(vec![]),
            deleted: StdMutex::new(vec![]),
        };
        let reconciler = Reconciler::new(Box::new(fake), subnet());
        let routes = vec![Route {
            dst_cidr: "10.254.0.5/32".into(),
            next_hop: "10.254.0.3".into(),
            reason: sdwan_common::models::RouteReason::OptimizedPath,
        }];
        let ok = reconciler.sync(&routes).await;
        assert!(ok);
    }
}
