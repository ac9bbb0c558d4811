use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

/// A single reading of one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerResourceUsage {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub cpu_usage_in_cores: f64,
    pub memory_usage_in_bytes: u64,
    pub memory_working_set_in_bytes: u64,
}

/// Readings of one tick, keyed by container name.
pub type ResourceUsagePerContainer = BTreeMap<String, ContainerResourceUsage>;

/// All ticks of one worker, in arrival order.
pub type ResourceSeries = Vec<ResourceUsagePerContainer>;
