#[macro_use]
extern crate tracing;

mod error;
mod gatherer;
pub mod inventory;
pub mod percentiles;
pub mod probe;
mod selector;
mod stop_signal;
mod summary;
mod usage;
mod worker;

#[cfg(test)]
mod testing;

pub use error::GathererError;
pub use gatherer::{
    ContainerResourceGatherer,
    WORKER_JOIN_TIMEOUT,
};
pub use inventory::{
    InstanceDescriptor,
    Inventory,
    MachineDescriptor,
    StaticInventory,
};
pub use probe::{
    KubeletSummaryProbe,
    ResourceProbe,
};
pub use selector::{
    select_targets,
    TargetSelection,
};
pub use stop_signal::StopSignal;
pub use summary::{
    ResourceUsageSummary,
    SingleContainerSummary,
};
pub use usage::{
    ContainerResourceUsage,
    ResourceSeries,
    ResourceUsagePerContainer,
};
