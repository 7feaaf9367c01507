//! CSV dataset source
//!
//! Expected layout:
//!
//! ```text
//! Date,Kuala Lumpur,La Paz,Lisbon
//! 2024-01-01,31.2,11.4,14.9
//! 2024-01-02,30.8,12.0,15.3
//! ```
//!
//! Each column after the first becomes a partition; the first `rows` data rows
//! are read and any further rows are ignored.

use super::{Dataset, Partition};
use crate::error::StatsError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Load a CSV file
pub fn load_csv(path: &Path, rows: usize) -> Result<Dataset, StatsError> {
    let file = File::open(path).map_err(|e| {
        StatsError::Load(format!("cannot open {}: {}", path.display(), e))
    })?;

    parse_csv(BufReader::new(file), rows)
        .map_err(|e| match e {
            StatsError::Load(msg) => StatsError::Load(format!("{}: {}", path.display(), msg)),
            other => other,
        })
}

/// Parse CSV content from any buffered reader
pub fn parse_csv<R: BufRead>(reader: R, rows: usize) -> Result<Dataset, StatsError> {
    if rows == 0 {
        return Err(StatsError::Load("partition length must be at least 1".into()));
    }

    let mut lines = reader.lines().enumerate();

    let header = loop {
        match lines.next() {
            Some((_, Ok(line))) if line.trim().is_empty() => continue,
            Some((_, Ok(line))) => break line,
            Some((n, Err(e))) => {
                return Err(StatsError::Load(format!("line {}: {}", n + 1, e)));
            }
            None => return Err(StatsError::Load("missing header row".into())),
        }
    };

    let names: Vec<String> = header
        .split(',')
        .skip(1)
        .map(|name| name.trim().to_string())
        .collect();

    if names.is_empty() {
        return Err(StatsError::Load(
            "header has no partition columns after the row label".into(),
        ));
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(rows); names.len()];
    let mut read = 0;

    for (n, line) in lines {
        if read == rows {
            break;
        }

        let line = line.map_err(|e| StatsError::Load(format!("line {}: {}", n + 1, e)))?;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != names.len() + 1 {
            return Err(StatsError::Load(format!(
                "line {}: expected {} columns, got {}",
                n + 1,
                names.len() + 1,
                fields.len()
            )));
        }

        for (column, field) in columns.iter_mut().zip(&fields[1..]) {
            let value: f64 = field.trim().parse().map_err(|_| {
                StatsError::Load(format!("line {}: invalid number '{}'", n + 1, field.trim()))
            })?;
            if !value.is_finite() {
                return Err(StatsError::Load(format!(
                    "line {}: non-finite value '{}'",
                    n + 1,
                    field.trim()
                )));
            }
            column.push(value);
        }

        read += 1;
    }

    if read < rows {
        return Err(StatsError::Load(format!(
            "expected {} data rows, found {}",
            rows, read
        )));
    }

    let partitions = names
        .into_iter()
        .zip(columns)
        .enumerate()
        .map(|(id, (name, values))| Partition::new(id, name, values))
        .collect();

    Dataset::new(partitions)
}
