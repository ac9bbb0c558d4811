#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod options;

pub use app_config::get_config_dir;
pub use args::Args;
use color_eyre::Result;
use eyre::eyre;
pub use options::{
    GathererOptions,
    LabelSelector,
    SelectionPolicy,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    path::PathBuf,
    time::Duration,
};

/// Where the kubelet summary endpoint of each machine is reachable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KubeletConfig {
    pub scheme: String,
    pub port: u16,
}

impl Default for KubeletConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            port: 10255,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub gatherer: GathererOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_file: Option<PathBuf>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub kubelet: KubeletConfig,
    #[serde(default)]
    pub percentiles: Vec<u32>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Config {
    /// Layers the embedded defaults, the stored `config.yaml`, an optional `--config` file and the
    /// command line arguments, in that order.
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        let config_dir = get_config_dir();
        let mut builder =
            config::Config::builder().add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        let stored = config_dir.join("config.yaml");
        debug!(path = ?stored, "Looking for stored config");
        builder = builder.add_source(
            config::File::from(stored)
                .format(config::FileFormat::Yaml)
                .required(false),
        );

        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()).format(config::FileFormat::Yaml));
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.gatherer.validate()?;
        if self.percentiles.is_empty() {
            return Err(eyre!("at least one percentile must be requested"));
        }
        if let Some(invalid) = self.percentiles.iter().find(|p| !(1..=100).contains(*p)) {
            return Err(eyre!("percentile {invalid} is outside of 1..=100"));
        }
        if !self.gatherer.simulated_environment && self.inventory_file.is_none() {
            return Err(eyre!(
                "an inventory snapshot (--inventory) is required unless the environment is simulated"
            ));
        }
        Ok(())
    }
}
