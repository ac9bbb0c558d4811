//! Fake collaborators shared by the unit tests.

use crate::{
    inventory::{
        InstanceDescriptor,
        Inventory,
        MachineDescriptor,
    },
    probe::ResourceProbe,
    usage::ContainerResourceUsage,
};
use chrono::{
    DateTime,
    Utc,
};
use eyre::{
    eyre,
    Result,
};
use futures::future::BoxFuture;
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::Mutex,
    time::Duration,
};
use tokio::time::Instant;

pub(crate) fn usage(name: &str, cpu: f64, mem: u64) -> ContainerResourceUsage {
    ContainerResourceUsage {
        name: name.to_string(),
        timestamp: DateTime::<Utc>::UNIX_EPOCH,
        cpu_usage_in_cores: cpu,
        memory_usage_in_bytes: mem,
        memory_working_set_in_bytes: mem,
    }
}

pub(crate) fn instance(name: &str, host: &str, containers: &[&str]) -> InstanceDescriptor {
    InstanceDescriptor {
        name: name.to_string(),
        host_machine: host.to_string(),
        owner_kind: Some("ReplicaSet".to_string()),
        containers: containers.iter().map(|c| c.to_string()).collect(),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeInventory {
    pub machines: Vec<MachineDescriptor>,
    pub instances: Vec<InstanceDescriptor>,
    pub fail_instances: bool,
    pub fail_machines: bool,
    pub listed_namespaces: Mutex<Vec<String>>,
}

impl Inventory for FakeInventory {
    fn list_instances<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<Vec<InstanceDescriptor>>> {
        Box::pin(async move {
            self.listed_namespaces.lock().unwrap().push(namespace.to_string());
            if self.fail_instances {
                return Err(eyre!("instances unavailable"));
            }
            Ok(self.instances.clone())
        })
    }

    fn list_machines(&self) -> BoxFuture<'_, Result<Vec<MachineDescriptor>>> {
        Box::pin(async move {
            if self.fail_machines {
                return Err(eyre!("machines unavailable"));
            }
            Ok(self.machines.clone())
        })
    }
}

/// Returns a fixed reading per machine and records every call.
#[derive(Debug, Default)]
pub(crate) struct ScriptedProbe {
    readings: HashMap<String, Vec<ContainerResourceUsage>>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    calls: Mutex<Vec<(String, Vec<String>, Instant)>>,
}

impl ScriptedProbe {
    pub(crate) fn with_reading(mut self, machine: &str, usage: ContainerResourceUsage) -> Self {
        self.readings.entry(machine.to_string()).or_default().push(usage);
        self
    }

    pub(crate) fn failing(mut self, machine: &str) -> Self {
        self.failing.insert(machine.to_string());
        self
    }

    /// Probes of `machine` never complete on their own.
    pub(crate) fn hanging(mut self, machine: &str) -> Self {
        self.hanging.insert(machine.to_string());
        self
    }

    pub(crate) fn call_times(&self, machine: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _, _)| m == machine)
            .map(|(_, _, at)| *at)
            .collect()
    }

    pub(crate) fn tracked_names(&self, machine: &str) -> Option<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(m, _, _)| m == machine)
            .map(|(_, names, _)| names.clone())
    }
}

impl ResourceProbe for ScriptedProbe {
    fn probe<'a>(
        &'a self,
        machine: &'a str,
        container_names: &'a [String],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<ContainerResourceUsage>>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((machine.to_string(), container_names.to_vec(), Instant::now()));
            if self.hanging.contains(machine) {
                std::future::pending::<()>().await;
            }
            if self.failing.contains(machine) {
                return Err(eyre!("probe of {machine} failed"));
            }
            Ok(self.readings.get(machine).cloned().unwrap_or_default())
        })
    }
}
