use eyre::{
    Context as _,
    Result,
};
use resource_gatherer::{
    ContainerResourceGatherer,
    KubeletSummaryProbe,
    ResourceUsageSummary,
    StaticInventory,
};
use resource_gatherer_config::{
    Args,
    Config,
};
use std::sync::Arc;

pub struct App {
    config: Config,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = Config::new(args).context("Failed to load config")?;
        config.validate()?;
        debug!(?config, "Loaded config");
        Ok(Self { config })
    }

    /// Gathers until the configured duration elapses or Ctrl-C is pressed, then reports.
    pub async fn run(self) -> Result<()> {
        let inventory = match &self.config.inventory_file {
            Some(path) => StaticInventory::from_file(path).await?,
            None => StaticInventory::default(),
        };
        let probe = Arc::new(KubeletSummaryProbe::new(
            self.config.kubelet.scheme.clone(),
            self.config.kubelet.port,
        ));

        let gatherer = Arc::new(
            ContainerResourceGatherer::new(
                &inventory,
                probe,
                &self.config.host,
                &self.config.provider,
                self.config.gatherer.clone(),
                None,
            )
            .await?,
        );
        info!(machines = ?gatherer.machines(), "Starting resource gathering");

        let running = tokio::spawn({
            let gatherer = gatherer.clone();
            async move { gatherer.start_gathering_data().await }
        });

        match self.config.duration {
            Some(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => info!(?duration, "Gathering duration elapsed"),
                    _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping early"),
                }
            }
            None => {
                info!("Gathering until interrupted (Ctrl-C)");
                tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
            }
        }

        let summary = gatherer.stop_and_summarize(&self.config.percentiles).await?;
        // Workers that missed the join timeout are abandoned.
        running.abort();

        println!("{}", summary.format());
        self.export(&summary).await
    }

    async fn export(&self, summary: &ResourceUsageSummary) -> Result<()> {
        let Some(path) = &self.config.output_file else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(summary)?;
        tokio::fs::write(path, json)
            .await
            .wrap_err_with(|| format!("Failed to write summary to {path:?}"))?;
        info!(?path, "Exported resource usage summary");
        Ok(())
    }
}
