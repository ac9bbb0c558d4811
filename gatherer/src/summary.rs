use crate::percentiles::PercentileUsage;
use comfy_table::{
    presets,
    Attribute,
    Cell,
    CellAlignment,
    Color,
    ContentArrangement,
    Table,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

/// Usage of one container at one percentile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleContainerSummary {
    #[serde(rename = "Name")]
    pub name: String,
    /// CPU usage in cores.
    #[serde(rename = "Cpu")]
    pub cpu: f64,
    /// Memory working set in bytes.
    #[serde(rename = "Mem")]
    pub mem: u64,
}

impl SingleContainerSummary {
    pub fn new(name: impl Into<String>, cpu: f64, mem: u64) -> Self {
        Self {
            name: name.into(),
            cpu,
            mem,
        }
    }
}

/// Percentile label (e.g. `"99"`) → containers sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_more::Deref)]
#[serde(transparent)]
pub struct ResourceUsageSummary(BTreeMap<String, Vec<SingleContainerSummary>>);

impl ResourceUsageSummary {
    /// Builds the summary for `percentiles`. Percentiles without data get no bucket.
    pub(crate) fn from_percentiles(data: &PercentileUsage, percentiles: &[u32]) -> Self {
        let mut summary = BTreeMap::new();
        for percentile in percentiles {
            let Some(bucket) = data.get(percentile).filter(|bucket| !bucket.is_empty()) else {
                continue;
            };
            // Buckets are keyed by name, so iteration is already sorted and unique.
            let records = bucket
                .iter()
                .map(|(name, usage)| {
                    SingleContainerSummary::new(name, usage.cpu_usage_in_cores, usage.memory_working_set_in_bytes)
                })
                .collect();
            summary.insert(percentile.to_string(), records);
        }
        Self(summary)
    }

    /// Containers for the given percentile label; empty if the percentile has no data.
    pub fn get(&self, percentile: &str) -> &[SingleContainerSummary] {
        self.0.get(percentile).map(Vec::as_slice).unwrap_or_default()
    }

    /// Percentile labels in numeric order.
    pub fn percentiles(&self) -> Vec<&str> {
        let mut labels = self.0.keys().map(String::as_str).collect::<Vec<_>>();
        labels.sort_by_key(|label| label.parse::<u32>().unwrap_or(u32::MAX));
        labels
    }

    pub fn format(&self) -> String {
        if self.0.is_empty() {
            return "No resource usage data was gathered.\n".to_string();
        }

        let mut output = String::new();
        for label in self.percentiles() {
            let mut table = Table::new();
            table
                .load_preset(presets::UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    Cell::new(format!("P{label}"))
                        .add_attribute(Attribute::Bold)
                        .fg(Color::Cyan),
                    Cell::new("CPU (cores)").add_attribute(Attribute::Bold),
                    Cell::new("Memory (MiB)").add_attribute(Attribute::Bold),
                ]);

            for record in self.get(label) {
                table.add_row(vec![
                    Cell::new(&record.name),
                    Cell::new(format!("{:.3}", record.cpu))
                        .set_alignment(CellAlignment::Right)
                        .fg(cpu_color(record.cpu)),
                    Cell::new(format!("{:.1}", record.mem as f64 / (1024.0 * 1024.0)))
                        .set_alignment(CellAlignment::Right),
                ]);
            }

            output.push_str(&format!("\n{table}\n"));
        }
        output
    }
}

fn cpu_color(cores: f64) -> Color {
    if cores >= 1.0 {
        Color::Red
    } else if cores >= 0.5 {
        Color::Yellow
    } else {
        Color::Green
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        percentiles::compute_percentiles,
        testing::usage,
    };
    use pretty_assertions::assert_eq;

    fn summary() -> ResourceUsageSummary {
        let tick = [("zeta", 0.2, 2048), ("alpha", 1.5, 1024)]
            .into_iter()
            .map(|(name, cpu, mem)| (name.to_string(), usage(name, cpu, mem)))
            .collect();
        let data = compute_percentiles(&vec![tick], &[50, 100, 9]);
        ResourceUsageSummary::from_percentiles(&data, &[50, 100, 9])
    }

    #[test]
    fn buckets_are_sorted_by_container_name() {
        let summary = summary();
        assert_eq!(
            summary.get("50"),
            &[
                SingleContainerSummary::new("alpha", 1.5, 1024),
                SingleContainerSummary::new("zeta", 0.2, 2048),
            ]
        );
        assert_eq!(summary.percentiles(), vec!["9", "50", "100"]);
        assert!(summary.get("75").is_empty());
    }

    #[test]
    fn serializes_like_the_report_format() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["50"][0]["Name"], "alpha");
        assert_eq!(json["50"][0]["Cpu"], 1.5);
        assert_eq!(json["50"][1]["Mem"], 2048);
    }

    #[test]
    fn percentiles_without_data_are_omitted() {
        let summary = ResourceUsageSummary::from_percentiles(&PercentileUsage::new(), &[50, 99]);
        assert!(summary.is_empty());
        assert_eq!(summary, ResourceUsageSummary::default());
        assert!(summary.format().contains("No resource usage data"));
    }

    #[test]
    fn format_renders_one_table_per_percentile() {
        let output = summary().format();
        assert!(output.contains("P50"));
        assert!(output.contains("P100"));
        assert!(output.contains("alpha"));
        assert!(output.contains("1.500"));
    }
}
