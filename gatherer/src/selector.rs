//! Decides which machines get a sampling worker and which containers those workers track.

use crate::inventory::{
    is_control_plane_name,
    InstanceDescriptor,
    MachineDescriptor,
};
use resource_gatherer_config::{
    LabelSelector,
    SelectionPolicy,
};
use std::collections::{
    HashMap,
    HashSet,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSelection {
    /// Machines to sample, in inventory order.
    pub machines: Vec<String>,
    /// Tracked container names, shared by every worker.
    pub container_names: Vec<String>,
}

pub fn select_targets(
    policy: SelectionPolicy,
    named_service: &LabelSelector,
    instances: &[InstanceDescriptor],
    machines: &[MachineDescriptor],
) -> TargetSelection {
    let control_plane = machines
        .iter()
        .map(|machine| (machine.name.as_str(), machine.is_control_plane))
        .collect::<HashMap<_, _>>();
    // Hosts missing from the machine listing fall back to the naming convention.
    let on_control_plane = |instance: &InstanceDescriptor| {
        control_plane
            .get(instance.host_machine.as_str())
            .copied()
            .unwrap_or_else(|| is_control_plane_name(&instance.host_machine))
    };

    let mut container_names = Vec::new();
    let mut extra_machines = HashSet::new();

    for instance in instances {
        let in_scope = match policy {
            SelectionPolicy::AllMachines => true,
            SelectionPolicy::ControlPlaneOnly => on_control_plane(instance),
            SelectionPolicy::ControlPlaneAndNamedService => {
                on_control_plane(instance) || named_service.matches(instance.labels.iter())
            }
            SelectionPolicy::ControlPlaneAndNonDaemons => on_control_plane(instance) || !instance.is_daemon(),
        };
        if !in_scope {
            continue;
        }

        container_names.extend(instance.container_names().cloned());

        if matches!(
            policy,
            SelectionPolicy::ControlPlaneAndNamedService | SelectionPolicy::ControlPlaneAndNonDaemons
        ) {
            extra_machines.insert(instance.host_machine.as_str());
        }
    }

    let mut selected = Vec::new();
    for machine in machines {
        if policy == SelectionPolicy::AllMachines
            || machine.is_control_plane
            || extra_machines.contains(machine.name.as_str())
        {
            selected.push(machine.name.clone());
            // A single worker samples the control plane.
            // TODO: decide whether multi-master clusters should get one worker per control-plane machine.
            if policy == SelectionPolicy::ControlPlaneOnly {
                break;
            }
        }
    }

    TargetSelection {
        machines: selected,
        container_names,
    }
}
