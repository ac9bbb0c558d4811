use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;
use strum::{
    Display,
    EnumIter,
    EnumString,
};

/// Which machines get a sampling worker and which containers are tracked.
#[derive(Debug, Default, Clone, Copy, Display, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SelectionPolicy {
    /// All containers on all machines.
    #[default]
    AllMachines,
    /// Containers on control-plane machines only, sampled by a single worker.
    ControlPlaneOnly,
    /// Control-plane containers plus the instances of a named service, wherever they run.
    ControlPlaneAndNamedService,
    /// Control-plane containers plus every instance that is not owned by a per-node daemon.
    ControlPlaneAndNonDaemons,
}

/// Label `key=value` used to recognize the instances of a named service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

impl Default for LabelSelector {
    fn default() -> Self {
        Self {
            key: "k8s-app".to_string(),
            value: "kube-dns".to_string(),
        }
    }
}

impl LabelSelector {
    pub fn matches<'a>(&self, mut labels: impl Iterator<Item = (&'a String, &'a String)>) -> bool {
        labels.any(|(key, value)| *key == self.key && *value == self.value)
    }
}

impl std::fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GathererOptions {
    /// Replace the per-machine workers with exactly one worker sampling the cluster host.
    #[serde(default)]
    pub simulated_environment: bool,
    #[serde(default)]
    pub selection_policy: SelectionPolicy,
    #[serde(default)]
    pub named_service: LabelSelector,
    /// Window over which worker start times are staggered; also each worker's tick period.
    #[serde(with = "humantime_serde")]
    pub sampling_window: Duration,
    /// Upper bound for a single probe.
    #[serde(with = "humantime_serde")]
    pub probe_duration: Duration,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GathererOptions {
    fn default() -> Self {
        Self {
            simulated_environment: false,
            selection_policy: SelectionPolicy::default(),
            named_service: LabelSelector::default(),
            sampling_window: Duration::from_secs(10),
            probe_duration: Duration::from_secs(5),
            verbose: false,
        }
    }
}

impl GathererOptions {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.sampling_window.is_zero() {
            return Err(eyre::eyre!("sampling_window must be greater than zero"));
        }
        if self.probe_duration.is_zero() {
            return Err(eyre::eyre!("probe_duration must be greater than zero"));
        }
        Ok(())
    }
}
