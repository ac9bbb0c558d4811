use crate::{
    probe::ResourceProbe,
    stop_signal::StopSignal,
    usage::{
        ResourceSeries,
        ResourceUsagePerContainer,
    },
};
use std::{
    sync::{
        Arc,
        OnceLock,
    },
    time::Duration,
};
use tokio::time::{
    interval_at,
    Instant,
    MissedTickBehavior,
};

/// Samples one machine until the stop signal closes.
///
/// The series is owned by the running task and published once, when the worker finishes; a
/// published series marks the worker as finished for good.
#[derive(Clone)]
pub(crate) struct ResourceGatherWorker {
    machine: String,
    container_names: Arc<[String]>,
    probe: Arc<dyn ResourceProbe>,
    stop: StopSignal,
    period: Duration,
    probe_duration: Duration,
    verbose: bool,
    series: Arc<OnceLock<ResourceSeries>>,
}

impl std::fmt::Debug for ResourceGatherWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGatherWorker")
            .field("machine", &self.machine)
            .field("containers", &self.container_names.len())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl ResourceGatherWorker {
    pub(crate) fn new(
        machine: String,
        container_names: Arc<[String]>,
        probe: Arc<dyn ResourceProbe>,
        stop: StopSignal,
        period: Duration,
        probe_duration: Duration,
        verbose: bool,
    ) -> Self {
        Self {
            machine,
            container_names,
            probe,
            stop,
            period,
            probe_duration,
            verbose,
            series: Default::default(),
        }
    }

    pub(crate) fn machine(&self) -> &str {
        &self.machine
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.series.get().is_some()
    }

    /// The collected samples, available only after the worker finished.
    pub(crate) fn series(&self) -> Option<&ResourceSeries> {
        self.series.get()
    }

    pub(crate) async fn gather(self, initial_delay: Duration) {
        let mut series = ResourceSeries::new();

        tokio::select! {
            biased;
            _ = self.stop.closed() => {},
            _ = self.sample_until_stopped(initial_delay, &mut series) => {},
        }

        debug!(machine = %self.machine, samples = series.len(), "Closing worker");
        if self.series.set(series).is_err() {
            warn!(machine = %self.machine, "Worker already published its samples");
        }
    }

    async fn sample_until_stopped(&self, initial_delay: Duration, series: &mut ResourceSeries) {
        let mut ticker = interval_at(Instant::now() + initial_delay, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(tick) = self.single_probe().await {
                series.push(tick);
            }
        }
    }

    /// A failed or timed out probe leaves a gap in the series.
    async fn single_probe(&self) -> Option<ResourceUsagePerContainer> {
        let probe = self
            .probe
            .probe(&self.machine, &self.container_names, self.probe_duration);

        match tokio::time::timeout(self.probe_duration, probe).await {
            Ok(Ok(readings)) => {
                let tick = readings
                    .into_iter()
                    .map(|usage| (usage.name.clone(), usage))
                    .collect::<ResourceUsagePerContainer>();
                if self.verbose {
                    info!(
                        machine = %self.machine,
                        containers = tick.len(),
                        "Finished probe: {}",
                        describe_tick(&tick)
                    );
                } else {
                    debug!(machine = %self.machine, containers = tick.len(), "Finished probe");
                }
                Some(tick)
            }
            Ok(Err(err)) => {
                warn!(machine = %self.machine, "Error while reading data: {err}");
                None
            }
            Err(_) => {
                warn!(
                    machine = %self.machine,
                    timeout = ?self.probe_duration,
                    "Probe did not finish in time"
                );
                None
            }
        }
    }
}

/// One `name: cpu, memory` entry per container, in name order.
fn describe_tick(tick: &ResourceUsagePerContainer) -> String {
    tick.values()
        .map(|usage| {
            format!(
                "{}: {:.3} cores, {} bytes working set",
                usage.name, usage.cpu_usage_in_cores, usage.memory_working_set_in_bytes
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}
