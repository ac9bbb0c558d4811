#[derive(thiserror::Error, Debug)]
pub enum GathererError {
    #[error("Invalid gatherer options: {0}")]
    InvalidOptions(eyre::Report),
    #[error("Listing instances in namespace {0} failed: {1}")]
    ListInstances(String, eyre::Report),
    #[error("Listing machines failed: {0}")]
    ListMachines(eyre::Report),
    /// `stop_and_summarize` was asked for no percentiles; the summary is empty.
    #[error("No percentiles requested, failed to get any resource usage data")]
    NoPercentiles,
}
