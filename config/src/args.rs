use crate::SelectionPolicy;
use clap::Parser;
use std::path::PathBuf;

/// Samples per-container CPU and memory usage across a cluster and prints a percentile summary.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Additional YAML config file, applied after the stored configuration.
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// YAML inventory snapshot listing machines and instances.
    #[clap(long, value_name = "FILE")]
    pub inventory: Option<PathBuf>,

    /// Machine selection policy.
    ///   - all-machines
    ///   - control-plane-only
    ///   - control-plane-and-named-service
    ///   - control-plane-and-non-daemons
    #[clap(long, value_name = "POLICY")]
    pub policy: Option<SelectionPolicy>,

    /// Sample a single simulated cluster host instead of every machine.
    #[clap(long, action)]
    pub simulated: bool,

    /// Cluster host, used as the target of the simulated worker.
    #[clap(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Cloud provider of the cluster.
    #[clap(long, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Stagger window and per-worker tick period (e.g. "10s").
    #[clap(long, value_name = "DURATION")]
    pub sampling_window: Option<String>,

    /// Upper bound for a single probe (e.g. "5s").
    #[clap(long, value_name = "DURATION")]
    pub probe_duration: Option<String>,

    /// Port of the kubelet summary endpoint.
    #[clap(long, value_name = "PORT")]
    pub kubelet_port: Option<u16>,

    /// Comma separated percentiles to report (e.g. "50,90,99").
    #[clap(long, value_name = "PERCENTILES", value_delimiter = ',')]
    pub percentiles: Option<Vec<u32>>,

    /// Stop after this long instead of waiting for Ctrl-C (e.g. "5m").
    #[clap(long, value_name = "DURATION")]
    pub duration: Option<String>,

    /// Write the summary as JSON to this file.
    #[clap(long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Log every probe and raise the log level of the gatherer.
    #[clap(short, long, action)]
    pub verbose: bool,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(inventory) = &self.inventory {
                cache.insert("inventory_file".to_string(), inventory.display().to_string().into());
            }
            if let Some(policy) = &self.policy {
                cache.insert("gatherer.selection_policy".to_string(), policy.to_string().into());
            }
            if self.simulated {
                cache.insert("gatherer.simulated_environment".to_string(), true.into());
            }
            if let Some(host) = &self.host {
                cache.insert("host".to_string(), host.clone().into());
            }
            if let Some(provider) = &self.provider {
                cache.insert("provider".to_string(), provider.clone().into());
            }
            if let Some(window) = &self.sampling_window {
                cache.insert("gatherer.sampling_window".to_string(), window.clone().into());
            }
            if let Some(probe_duration) = &self.probe_duration {
                cache.insert("gatherer.probe_duration".to_string(), probe_duration.clone().into());
            }
            if let Some(port) = self.kubelet_port {
                cache.insert("kubelet.port".to_string(), i64::from(port).into());
            }
            if let Some(percentiles) = &self.percentiles {
                cache.insert(
                    "percentiles".to_string(),
                    percentiles
                        .iter()
                        .map(|p| Value::from(i64::from(*p)))
                        .collect::<Vec<_>>()
                        .into(),
                );
            }
            if let Some(duration) = &self.duration {
                cache.insert("duration".to_string(), duration.clone().into());
            }
            if let Some(output_file) = &self.output_file {
                cache.insert("output_file".to_string(), output_file.display().to_string().into());
            }
            if self.verbose {
                cache.insert("gatherer.verbose".to_string(), true.into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();

    format!(
        "\
{version}

Authors: {author}

Config directory: {config_dir_path}",
        version = clap::crate_version!(),
    )
}
