//! Station crowd/safety dataset loaded from CSV.
//!
//! The CSV is expected to carry at least `Station` and `Time` (`HH:MM`)
//! columns; they are exposed as `station` and `time`, with `hour` derived from
//! `time`. All other columns (e.g. `Crowd_Level`, `Safety_Rating`) pass
//! through untouched, with numeric cells emitted as JSON numbers.

use crate::error::StationError;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;
use std::path::Path;

/// One row of the dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StationRecord {
    pub station: String,
    pub time: String,
    pub hour: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn cell_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    match trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(raw.to_string()),
    }
}

fn hour_of(time: &str) -> Result<u32, StationError> {
    time.split(':')
        .next()
        .and_then(|h| h.trim().parse::<u32>().ok())
        .ok_or_else(|| StationError::InvalidTime(time.to_string()))
}

#[derive(Clone, Debug, Default)]
pub struct StationDataset {
    records: Vec<StationRecord>,
    loaded: bool,
}

impl StationDataset {
    /// Parses CSV from any reader.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let mut records = Vec::new();
        for row in rdr.records() {
            records.push(row?);
        }
        Ok(Self::from_rows(&headers, records))
    }

    fn from_rows(headers: &csv::StringRecord, rows: Vec<csv::StringRecord>) -> Self {
        let mut records = Vec::with_capacity(rows.len());
        for (line, row) in rows.iter().enumerate() {
            match Self::record_from_row(headers, row) {
                Ok(r) => records.push(r),
                Err(e) => {
                    tracing::warn!(line = line + 2, error = %e, "Skipping station row");
                }
            }
        }
        Self {
            records,
            loaded: true,
        }
    }

    fn record_from_row(
        headers: &csv::StringRecord,
        row: &csv::StringRecord,
    ) -> Result<StationRecord, StationError> {
        let mut station = None;
        let mut time = None;
        let mut extra = Map::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            match header {
                "Station" | "station" => station = Some(cell.trim().to_string()),
                "Time" | "time" => time = Some(cell.trim().to_string()),
                other => {
                    extra.insert(other.to_string(), cell_value(cell));
                }
            }
        }
        let station = station.ok_or(StationError::MissingColumn("Station"))?;
        let time = time.ok_or(StationError::MissingColumn("Time"))?;
        let hour = hour_of(&time)?;
        Ok(StationRecord {
            station,
            time,
            hour,
            extra,
        })
    }

    /// Loads the dataset from disk. A missing file yields an unloaded dataset
    /// rather than an error, so the service still starts.
    #[tracing::instrument]
    pub fn load(path: &Path) -> Result<Self, StationError> {
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Station dataset not found");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(StationError::Csv {
                    path: path.to_path_buf(),
                    source: e.into(),
                });
            }
        };
        let dataset = Self::from_reader(file).map_err(|source| StationError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(rows = dataset.len(), "Loaded station dataset");
        Ok(dataset)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted, unique station names.
    pub fn stations(&self) -> Result<Vec<String>, StationError> {
        if !self.loaded {
            return Err(StationError::NotLoaded);
        }
        let names: BTreeSet<&str> = self.records.iter().map(|r| r.station.as_str()).collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    /// Rows for `name`, compared case-insensitively, in file order.
    pub fn analysis(&self, name: &str) -> Result<Vec<&StationRecord>, StationError> {
        if !self.loaded {
            return Err(StationError::NotLoaded);
        }
        let wanted = name.to_lowercase();
        Ok(self
            .records
            .iter()
            .filter(|r| r.station.to_lowercase() == wanted)
            .collect())
    }
}
