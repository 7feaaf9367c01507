//! Human-readable text output

use crate::coordinator::RunOutcome;
use crate::dataset::Dataset;
use crate::stats::{Classification, ClassificationThresholds, StatisticsRecord};
use std::fmt::Write;

const SEPARATOR: &str = "--------------------------------------------------";

/// Print run results to console
///
/// One block per partition in id order, followed by the run summary.
pub fn print_results(outcome: &RunOutcome, dataset: &Dataset, thresholds: &ClassificationThresholds) {
    print!("{}", format_results(outcome, dataset, thresholds));
}

/// Render run results as text
pub fn format_results(
    outcome: &RunOutcome,
    dataset: &Dataset,
    thresholds: &ClassificationThresholds,
) -> String {
    let mut out = String::new();

    out.push_str("═══════════════════════════════════════════════════════════\n");
    out.push_str("                  PARTITION STATISTICS\n");
    out.push_str("═══════════════════════════════════════════════════════════\n");
    out.push('\n');

    for record in &outcome.table {
        let name = dataset
            .partition(record.partition_id)
            .map(|p| p.name.as_str())
            .unwrap_or("?");
        format_record(&mut out, record, name, thresholds);
    }

    let _ = writeln!(out, "Substrate: {}", outcome.substrate);
    let _ = writeln!(out, "Workers: {}", outcome.workers);
    let _ = writeln!(out, "Total Execution Time: {:.6} seconds", outcome.elapsed.as_secs_f64());

    out
}

fn format_record(
    out: &mut String,
    record: &StatisticsRecord,
    name: &str,
    thresholds: &ClassificationThresholds,
) {
    let _ = writeln!(out, "Partition {} ({}):", record.partition_id + 1, name);
    let _ = writeln!(out, "  Min = {:.1}°C", record.min);
    let _ = writeln!(out, "  Max = {:.1}°C", record.max);
    let _ = writeln!(out, "  Avg = {:.2}°C", record.mean);
    let _ = writeln!(out, "  StdDev = {:.2}", record.stddev);
    let _ = writeln!(out, "  {}", classification_line(record.classification, thresholds));
    let _ = writeln!(out, "{}", SEPARATOR);
}

/// Classification sentence with the thresholds that produced it
pub fn classification_line(
    classification: Classification,
    thresholds: &ClassificationThresholds,
) -> String {
    match classification {
        Classification::Heatwave => {
            format!("Heatwave classified (Avg > {}°C)", thresholds.heatwave_above)
        }
        Classification::ColdSnap => {
            format!("Cold Snap classified (Avg < {}°C)", thresholds.cold_below)
        }
        Classification::Normal => "Normal temperature".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Substrate;
    use crate::dataset::Partition;
    use crate::worker::SharedMemoryEngine;
    use std::time::Duration;

    fn outcome() -> (RunOutcome, Dataset) {
        let dataset = Dataset::new(vec![
            Partition::new(0, "Kuala Lumpur", vec![10.0, 20.0, 30.0]),
            Partition::new(1, "La Paz", vec![5.0, 10.0, 12.0]),
        ])
        .unwrap();
        let table = SharedMemoryEngine::new(2, ClassificationThresholds::default())
            .run(&dataset)
            .unwrap();

        let outcome = RunOutcome {
            table,
            substrate: Substrate::Threads,
            workers: 2,
            elapsed: Duration::from_millis(5),
        };
        (outcome, dataset)
    }

    #[test]
    fn test_format_results() {
        let (outcome, dataset) = outcome();
        let text = format_results(&outcome, &dataset, &ClassificationThresholds::default());

        assert!(text.contains("Partition 1 (Kuala Lumpur):\n  Min = 10.0°C\n  Max = 30.0°C\n  Avg = 20.00°C\n  StdDev = 8.16\n  Normal temperature\n"));
        assert!(text.contains("Partition 2 (La Paz):"));
        assert!(text.contains("Cold Snap classified (Avg < 13°C)"));
        assert!(text.contains("Substrate: threads"));
        assert!(text.contains("Workers: 2"));

        let first = text.find("Partition 1").unwrap();
        let second = text.find("Partition 2").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_classification_line() {
        let t = ClassificationThresholds::default();
        assert_eq!(
            classification_line(Classification::Heatwave, &t),
            "Heatwave classified (Avg > 30°C)"
        );
        assert_eq!(classification_line(Classification::Normal, &t), "Normal temperature");
    }
}
