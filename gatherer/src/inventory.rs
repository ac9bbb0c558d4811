//! Cluster inventory: which machines exist and which workload instances run on them.

use eyre::{
    Context as _,
    Result,
};
use futures::future::BoxFuture;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    path::Path,
};

/// Namespace listed when the caller does not hand in an instance list.
pub const SYSTEM_NAMESPACE: &str = "kube-system";

/// Owner kinds that run exactly one copy per machine.
const DAEMON_OWNER_KINDS: [&str; 2] = ["DaemonSet", "Node"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDescriptor {
    pub name: String,
    pub is_control_plane: bool,
}

impl MachineDescriptor {
    pub fn new(name: impl Into<String>, is_control_plane: bool) -> Self {
        Self {
            name: name.into(),
            is_control_plane,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub host_machine: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Kind of the owning controller, `None` when it could not be determined.
    #[serde(default)]
    pub owner_kind: Option<String>,
    #[serde(default)]
    pub init_containers: Vec<String>,
    #[serde(default)]
    pub containers: Vec<String>,
}

fn default_namespace() -> String {
    SYSTEM_NAMESPACE.to_string()
}

impl InstanceDescriptor {
    /// An instance without a known owner is not treated as a daemon.
    pub fn is_daemon(&self) -> bool {
        self.owner_kind
            .as_deref()
            .is_some_and(|kind| DAEMON_OWNER_KINDS.contains(&kind))
    }

    /// Init containers first, then regular containers.
    pub fn container_names(&self) -> impl Iterator<Item = &String> {
        self.init_containers.iter().chain(self.containers.iter())
    }
}

/// Source of the inventory snapshot a gatherer is built from.
pub trait Inventory: Send + Sync {
    fn list_instances<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<Vec<InstanceDescriptor>>>;

    fn list_machines(&self) -> BoxFuture<'_, Result<Vec<MachineDescriptor>>>;
}

/// Matches machine names ending in `master` or `master-XYZ`.
pub fn is_control_plane_name(name: &str) -> bool {
    if name.ends_with("master") {
        return true;
    }
    name.len() >= 10 && name.get(..name.len() - 3).is_some_and(|prefix| prefix.ends_with("master-"))
}

#[derive(Debug, Clone, Deserialize)]
struct MachineEntry {
    name: String,
    #[serde(default)]
    control_plane: Option<bool>,
}

impl From<MachineEntry> for MachineDescriptor {
    fn from(entry: MachineEntry) -> Self {
        let is_control_plane = entry
            .control_plane
            .unwrap_or_else(|| is_control_plane_name(&entry.name));
        Self {
            name: entry.name,
            is_control_plane,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    machines: Vec<MachineEntry>,
    #[serde(default)]
    instances: Vec<InstanceDescriptor>,
}

/// Inventory backed by a fixed snapshot, usually read from a YAML file.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    machines: Vec<MachineDescriptor>,
    instances: Vec<InstanceDescriptor>,
}

impl StaticInventory {
    pub fn new(machines: Vec<MachineDescriptor>, instances: Vec<InstanceDescriptor>) -> Self {
        Self { machines, instances }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_yml::from_str(content).context("Failed to parse inventory snapshot")?;
        Ok(Self {
            machines: snapshot.machines.into_iter().map(MachineDescriptor::from).collect(),
            instances: snapshot.instances,
        })
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("Failed to read inventory from {path:?}"))?;
        let inventory = Self::from_yaml(&content)?;
        debug!(
            ?path,
            machines = inventory.machines.len(),
            instances = inventory.instances.len(),
            "Loaded inventory snapshot"
        );
        Ok(inventory)
    }
}

impl Inventory for StaticInventory {
    fn list_instances<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<Vec<InstanceDescriptor>>> {
        Box::pin(async move {
            Ok(self
                .instances
                .iter()
                .filter(|instance| instance.namespace == namespace)
                .cloned()
                .collect())
        })
    }

    fn list_machines(&self) -> BoxFuture<'_, Result<Vec<MachineDescriptor>>> {
        Box::pin(async move { Ok(self.machines.clone()) })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    const SNAPSHOT: &str = r#"
machines:
  - name: cluster-master
  - name: cluster-master-a1b
  - name: node-1
  - name: node-2
    control_plane: true
instances:
  - name: coredns-1
    host_machine: node-1
    labels:
      k8s-app: kube-dns
    owner_kind: ReplicaSet
    init_containers: [setup]
    containers: [coredns]
  - name: web-1
    namespace: default
    host_machine: node-1
    containers: [web]
"#;

    #[test]
    fn control_plane_names() {
        assert!(is_control_plane_name("master"));
        assert!(is_control_plane_name("e2e-test-master"));
        assert!(is_control_plane_name("e2e-test-master-x7q"));
        assert!(!is_control_plane_name("e2e-test-minion-x7q"));
        assert!(!is_control_plane_name("master-1"));
        assert!(!is_control_plane_name("node-1"));
    }

    #[test]
    fn daemon_owner_kinds() {
        let mut instance = InstanceDescriptor::default();
        assert!(!instance.is_daemon());
        instance.owner_kind = Some("DaemonSet".to_string());
        assert!(instance.is_daemon());
        instance.owner_kind = Some("Node".to_string());
        assert!(instance.is_daemon());
        instance.owner_kind = Some("ReplicaSet".to_string());
        assert!(!instance.is_daemon());
    }

    #[tokio::test]
    async fn snapshot_infers_control_plane_and_filters_namespace() {
        let inventory = StaticInventory::from_yaml(SNAPSHOT).unwrap();

        let machines = inventory.list_machines().await.unwrap();
        assert_eq!(
            machines,
            vec![
                MachineDescriptor::new("cluster-master", true),
                MachineDescriptor::new("cluster-master-a1b", true),
                MachineDescriptor::new("node-1", false),
                MachineDescriptor::new("node-2", true),
            ]
        );

        let system = inventory.list_instances(SYSTEM_NAMESPACE).await.unwrap();
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].name, "coredns-1");
        assert_eq!(
            system[0].container_names().cloned().collect::<Vec<_>>(),
            vec!["setup".to_string(), "coredns".to_string()]
        );

        let default = inventory.list_instances("default").await.unwrap();
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].name, "web-1");
    }

    #[tokio::test]
    async fn snapshot_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.yaml");
        std::fs::write(&path, SNAPSHOT).unwrap();
        let inventory = StaticInventory::from_file(&path).await.unwrap();
        let expected = StaticInventory::from_yaml(SNAPSHOT).unwrap();
        assert_eq!(inventory.list_machines().await.unwrap(), expected.machines);
        assert!(StaticInventory::from_file(dir.path().join("missing.yaml")).await.is_err());
    }
}
