use crate::usage::{
    ContainerResourceUsage,
    ResourceSeries,
    ResourceUsagePerContainer,
};
use std::collections::BTreeMap;

/// Percentile → container name → usage at that percentile.
pub type PercentileUsage = BTreeMap<u32, ResourceUsagePerContainer>;

#[derive(Debug, Default)]
struct UsageSamples {
    cpu: Vec<f64>,
    memory_usage: Vec<u64>,
    memory_working_set: Vec<u64>,
}

/// Index of percentile `percentile` in a sorted slice of `len` elements.
fn percentile_index(len: usize, percentile: u32) -> usize {
    let rank = (len * percentile.min(100) as usize).div_ceil(100);
    rank.saturating_sub(1).min(len.saturating_sub(1))
}

/// Computes per-container percentiles over a worker's time series.
///
/// CPU and the two memory figures are sorted independently, so a record may combine values taken
/// from different ticks.
pub fn compute_percentiles(series: &ResourceSeries, percentiles: &[u32]) -> PercentileUsage {
    if series.is_empty() {
        return PercentileUsage::new();
    }

    let mut samples: BTreeMap<&str, UsageSamples> = BTreeMap::new();
    for tick in series {
        for (name, usage) in tick {
            let entry = samples.entry(name.as_str()).or_default();
            entry.cpu.push(usage.cpu_usage_in_cores);
            entry.memory_usage.push(usage.memory_usage_in_bytes);
            entry.memory_working_set.push(usage.memory_working_set_in_bytes);
        }
    }
    for entry in samples.values_mut() {
        entry.cpu.sort_by(f64::total_cmp);
        entry.memory_usage.sort_unstable();
        entry.memory_working_set.sort_unstable();
    }

    let last_timestamp = series
        .iter()
        .flat_map(|tick| tick.values())
        .map(|usage| usage.timestamp)
        .max()
        .unwrap_or_default();

    percentiles
        .iter()
        .map(|&percentile| {
            let data = samples
                .iter()
                .map(|(name, entry)| {
                    let index = percentile_index(entry.cpu.len(), percentile);
                    let usage = ContainerResourceUsage {
                        name: name.to_string(),
                        timestamp: last_timestamp,
                        cpu_usage_in_cores: entry.cpu[index],
                        memory_usage_in_bytes: entry.memory_usage[index],
                        memory_working_set_in_bytes: entry.memory_working_set[index],
                    };
                    (name.to_string(), usage)
                })
                .collect();
            (percentile, data)
        })
        .collect()
}

/// Merges `incoming` into `accumulated`; names already present are never overwritten.
pub fn left_merge(accumulated: &mut PercentileUsage, incoming: PercentileUsage) {
    for (percentile, data) in incoming {
        let bucket = accumulated.entry(percentile).or_default();
        for (name, usage) in data {
            bucket.entry(name).or_insert(usage);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::usage;
    use pretty_assertions::assert_eq;

    fn tick(readings: &[(&str, f64, u64)]) -> ResourceUsagePerContainer {
        readings
            .iter()
            .map(|(name, cpu, mem)| (name.to_string(), usage(name, *cpu, *mem)))
            .collect()
    }

    #[test]
    fn index_follows_ceiling_rank() {
        assert_eq!(percentile_index(10, 50), 4);
        assert_eq!(percentile_index(10, 90), 8);
        assert_eq!(percentile_index(10, 99), 9);
        assert_eq!(percentile_index(10, 100), 9);
        assert_eq!(percentile_index(3, 50), 1);
        assert_eq!(percentile_index(1, 99), 0);
        assert_eq!(percentile_index(5, 0), 0);
        assert_eq!(percentile_index(5, 250), 4);
    }

    #[test]
    fn percentiles_sort_each_metric_independently() {
        let series = vec![
            tick(&[("a", 0.3, 100)]),
            tick(&[("a", 0.1, 300)]),
            tick(&[("a", 0.2, 200), ("b", 1.0, 10)]),
        ];
        let result = compute_percentiles(&series, &[50, 100]);

        let median = &result[&50]["a"];
        assert_eq!(median.cpu_usage_in_cores, 0.2);
        assert_eq!(median.memory_working_set_in_bytes, 200);

        let max = &result[&100]["a"];
        assert_eq!(max.cpu_usage_in_cores, 0.3);
        assert_eq!(max.memory_working_set_in_bytes, 300);

        // A container seen in a single tick reports that tick for every percentile.
        assert_eq!(result[&50]["b"].cpu_usage_in_cores, 1.0);
        assert_eq!(result[&100]["b"].memory_usage_in_bytes, 10);
    }

    #[test]
    fn empty_series_has_no_percentiles() {
        assert!(compute_percentiles(&Vec::new(), &[50, 99]).is_empty());
    }

    #[test]
    fn left_merge_keeps_the_first_writer() {
        let mut accumulated = compute_percentiles(&vec![tick(&[("shared", 1.0, 1), ("first", 0.5, 5)])], &[50]);
        let incoming = compute_percentiles(&vec![tick(&[("shared", 2.0, 2), ("second", 0.7, 7)])], &[50]);
        left_merge(&mut accumulated, incoming);

        let bucket = &accumulated[&50];
        assert_eq!(
            bucket.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["first", "second", "shared"]
        );
        assert_eq!(bucket["shared"].cpu_usage_in_cores, 1.0);
        assert_eq!(bucket["shared"].memory_working_set_in_bytes, 1);
        assert_eq!(bucket["second"].cpu_usage_in_cores, 0.7);
    }
}
