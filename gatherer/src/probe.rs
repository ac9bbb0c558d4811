//! The sampling primitive: one instantaneous CPU/memory reading of a machine's containers.

use crate::usage::ContainerResourceUsage;
use chrono::{
    DateTime,
    Utc,
};
use eyre::{
    Context as _,
    Result,
};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub trait ResourceProbe: Send + Sync {
    /// Reads the current usage of `container_names` on `machine`, giving up after `timeout`.
    /// An empty `container_names` list reads every container the machine reports.
    fn probe<'a>(
        &'a self,
        machine: &'a str,
        container_names: &'a [String],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<ContainerResourceUsage>>>;
}

/// Reads the kubelet `/stats/summary` endpoint of each machine.
#[derive(Debug, Clone)]
pub struct KubeletSummaryProbe {
    client: reqwest::Client,
    scheme: String,
    port: u16,
}

impl KubeletSummaryProbe {
    pub fn new(scheme: impl Into<String>, port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            scheme: scheme.into(),
            port,
        }
    }

    fn summary_url(&self, machine: &str) -> Result<Url> {
        let url = format!("{}://{}:{}/stats/summary", self.scheme, machine, self.port);
        Url::parse(&url).wrap_err_with(|| format!("Invalid kubelet summary URL {url:?}"))
    }

    async fn fetch_summary(&self, machine: &str, timeout: Duration) -> Result<Summary> {
        let url = self.summary_url(machine)?;
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .wrap_err_with(|| format!("Requesting {url} failed"))?
            .error_for_status()?;
        response
            .json::<Summary>()
            .await
            .wrap_err_with(|| format!("Decoding the summary from {url} failed"))
    }
}

impl ResourceProbe for KubeletSummaryProbe {
    fn probe<'a>(
        &'a self,
        machine: &'a str,
        container_names: &'a [String],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<ContainerResourceUsage>>> {
        Box::pin(async move {
            let summary = self.fetch_summary(machine, timeout).await?;
            Ok(usage_from_summary(machine, summary, container_names))
        })
    }
}

// Subset of the kubelet stats summary we rely on.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    #[serde(default)]
    node: NodeStats,
    #[serde(default)]
    pods: Vec<PodStats>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeStats {
    #[serde(default)]
    system_containers: Vec<ContainerStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStats {
    pod_ref: PodReference,
    #[serde(default)]
    containers: Vec<ContainerStats>,
}

#[derive(Debug, Deserialize)]
struct PodReference {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ContainerStats {
    name: String,
    #[serde(default)]
    cpu: Option<CpuStats>,
    #[serde(default)]
    memory: Option<MemoryStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CpuStats {
    #[serde(default)]
    time: Option<DateTime<Utc>>,
    #[serde(default)]
    usage_nano_cores: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoryStats {
    #[serde(default)]
    usage_bytes: Option<u64>,
    #[serde(default)]
    working_set_bytes: Option<u64>,
}

/// Containers without complete CPU and memory stats are skipped.
fn to_usage(name: String, stats: &ContainerStats) -> Option<ContainerResourceUsage> {
    let cpu = stats.cpu.as_ref()?;
    let memory = stats.memory.as_ref()?;
    Some(ContainerResourceUsage {
        name,
        timestamp: cpu.time.unwrap_or_else(Utc::now),
        cpu_usage_in_cores: cpu.usage_nano_cores? as f64 / 1e9,
        memory_usage_in_bytes: memory.usage_bytes?,
        memory_working_set_in_bytes: memory.working_set_bytes?,
    })
}

fn usage_from_summary(machine: &str, summary: Summary, container_names: &[String]) -> Vec<ContainerResourceUsage> {
    let mut usage = Vec::new();

    for pod in &summary.pods {
        for container in &pod.containers {
            if !container_names.is_empty() && !container_names.contains(&container.name) {
                continue;
            }
            usage.extend(to_usage(format!("{}/{}", pod.pod_ref.name, container.name), container));
        }
    }

    for container in &summary.node.system_containers {
        usage.extend(to_usage(format!("{}/{}", machine, container.name), container));
    }

    usage
}
