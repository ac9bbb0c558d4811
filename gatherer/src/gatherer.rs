use crate::{
    error::GathererError,
    inventory::{
        InstanceDescriptor,
        Inventory,
        SYSTEM_NAMESPACE,
    },
    percentiles::{
        compute_percentiles,
        left_merge,
        PercentileUsage,
    },
    probe::ResourceProbe,
    selector::select_targets,
    stop_signal::StopSignal,
    summary::ResourceUsageSummary,
    worker::ResourceGatherWorker,
};
use resource_gatherer_config::GathererOptions;
use std::{
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
    },
    time::Duration,
};
use tokio_util::task::TaskTracker;

/// How long `stop_and_summarize` waits for the workers before summarizing whatever finished.
pub const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Gathers per-container resource usage from a fixed set of machines, one worker per machine.
///
/// The gatherer supports a single stop lifecycle: once stopped, it cannot be restarted.
#[derive(Debug)]
pub struct ContainerResourceGatherer {
    options: GathererOptions,
    container_names: Arc<[String]>,
    workers: Vec<ResourceGatherWorker>,
    stop: StopSignal,
    started: AtomicBool,
    /// Set once the bounded join gave up on some workers; later stops do not wait again.
    join_timed_out: AtomicBool,
    tracker: TaskTracker,
}

impl ContainerResourceGatherer {
    /// Selects the machines and containers to monitor and builds one worker per machine.
    ///
    /// Without an explicit `instances` list, the instances of the system namespace are listed from
    /// `inventory`. In a simulated environment the inventory is not consulted at all and a single
    /// worker samples `host`.
    pub async fn new(
        inventory: &dyn Inventory,
        probe: Arc<dyn ResourceProbe>,
        host: &str,
        provider: &str,
        options: GathererOptions,
        instances: Option<Vec<InstanceDescriptor>>,
    ) -> Result<Self, GathererError> {
        options.validate().map_err(GathererError::InvalidOptions)?;

        let (machines, container_names) = if options.simulated_environment {
            info!(host, provider, "Gathering resource usage of a simulated environment");
            (vec![host.to_string()], Vec::new())
        } else {
            let instances = match instances {
                Some(instances) => instances,
                None => inventory
                    .list_instances(SYSTEM_NAMESPACE)
                    .await
                    .map_err(|err| GathererError::ListInstances(SYSTEM_NAMESPACE.to_string(), err))?,
            };
            let machines = inventory.list_machines().await.map_err(GathererError::ListMachines)?;
            let selection = select_targets(
                options.selection_policy,
                &options.named_service,
                &instances,
                &machines,
            );
            (selection.machines, selection.container_names)
        };

        let stop = StopSignal::new();
        let container_names: Arc<[String]> = container_names.into();
        let workers = machines
            .into_iter()
            .map(|machine| {
                ResourceGatherWorker::new(
                    machine,
                    container_names.clone(),
                    probe.clone(),
                    stop.clone(),
                    options.sampling_window,
                    options.probe_duration,
                    options.verbose,
                )
            })
            .collect::<Vec<_>>();

        info!(
            policy = %options.selection_policy,
            workers = workers.len(),
            containers = container_names.len(),
            "Created resource gatherer"
        );

        Ok(Self {
            options,
            container_names,
            workers,
            stop,
            started: AtomicBool::new(false),
            join_timed_out: AtomicBool::new(false),
            tracker: TaskTracker::new(),
        })
    }

    /// Machines with a worker, in launch order.
    pub fn machines(&self) -> Vec<&str> {
        self.workers.iter().map(ResourceGatherWorker::machine).collect()
    }

    pub fn container_names(&self) -> &[String] {
        &self.container_names
    }

    /// Machines whose worker has not finished yet.
    pub fn unfinished_machines(&self) -> Vec<&str> {
        self.workers
            .iter()
            .filter(|worker| !worker.is_finished())
            .map(ResourceGatherWorker::machine)
            .collect()
    }

    /// Launches every worker, spreading their first probes evenly over the sampling window, and
    /// waits until all of them exited. Workers exit once the gatherer is stopped.
    pub async fn start_gathering_data(&self) {
        if self.workers.is_empty() {
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Resource gathering was already started");
            return;
        }

        let delay_period = self.options.sampling_window / self.workers.len() as u32;
        for (index, worker) in self.workers.iter().enumerate() {
            let initial_delay = delay_period * index as u32;
            debug!(machine = worker.machine(), ?initial_delay, "Launching worker");
            self.tracker.spawn(worker.clone().gather(initial_delay));
        }
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Stops the workers, waits up to [`WORKER_JOIN_TIMEOUT`] for them and summarizes the data of
    /// every worker that finished.
    ///
    /// Workers are merged in launch order and the first value seen for a container name wins.
    pub async fn stop_and_summarize(&self, percentiles: &[u32]) -> Result<ResourceUsageSummary, GathererError> {
        self.stop();
        info!(workers = self.workers.len(), "Closed stop signal, waiting for workers");

        self.tracker.close();
        self.join_workers().await;

        if percentiles.is_empty() {
            warn!("Empty percentile list, no resource usage to summarize");
            return Err(GathererError::NoPercentiles);
        }

        let mut data = PercentileUsage::new();
        for worker in &self.workers {
            if let Some(series) = worker.series() {
                left_merge(&mut data, compute_percentiles(series, percentiles));
            }
        }

        Ok(ResourceUsageSummary::from_percentiles(&data, percentiles))
    }

    /// Waits for the workers at most [`WORKER_JOIN_TIMEOUT`], and only until the first timeout.
    async fn join_workers(&self) {
        if self.join_timed_out.load(Ordering::SeqCst) {
            debug!(unfinished = ?self.unfinished_machines(), "Join already timed out, not waiting again");
            return;
        }
        if tokio::time::timeout(WORKER_JOIN_TIMEOUT, self.tracker.wait())
            .await
            .is_ok()
        {
            info!("All workers finished");
        } else {
            self.join_timed_out.store(true, Ordering::SeqCst);
            warn!(
                unfinished = ?self.unfinished_machines(),
                "Timed out while waiting for workers, some failed to finish"
            );
        }
    }

    /// Stops the workers without summarizing. Safe to call at any point, any number of times.
    pub fn dispose(&self) {
        self.stop();
    }

    fn stop(&self) {
        if self.stop.close() {
            debug!("Stopping resource gathering");
        }
    }
}

impl Drop for ContainerResourceGatherer {
    fn drop(&mut self) {
        self.stop();
    }
}
