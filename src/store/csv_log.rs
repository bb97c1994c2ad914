//! Daily CSV log of resolved signals
//!
//! One row per resolution in `{data_dir}/outcomes/outcomes_YYYY-MM-DD.csv`.

use anyhow::{Context, Result};
use chrono::Utc;
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::types::TrackedSignal;

/// Outcome row for CSV storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub timestamp: i64,
    pub signal_id: String,
    pub symbol: String,
    pub direction: String,
    pub confidence: f64,
    pub volatility: f64,
    pub entry_price: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
    pub stop_loss: f64,
    pub extreme_price: f64,
    pub exit_price: f64,
    pub return_pct: f64,
    pub result: String,
    pub exit_reason: String,
    pub hold_duration_ms: i64,
}

impl OutcomeRecord {
    /// `None` for a signal that has not resolved yet
    pub fn from_signal(signal: &TrackedSignal) -> Option<Self> {
        let exit = signal.exit.as_ref()?;
        Some(Self {
            timestamp: exit.time.timestamp_millis(),
            signal_id: signal.id.clone(),
            symbol: signal.symbol.clone(),
            direction: signal.direction.to_string(),
            confidence: signal.confidence,
            volatility: signal.volatility,
            entry_price: signal.entry_price,
            tp1: signal.targets.tp1,
            tp2: signal.targets.tp2,
            tp3: signal.targets.tp3,
            stop_loss: signal.targets.stop_loss,
            extreme_price: signal.extreme_price,
            exit_price: exit.price,
            return_pct: exit.return_pct,
            result: signal.status.to_string(),
            exit_reason: exit.reason.to_string(),
            hold_duration_ms: signal.hold_duration_ms(exit.time),
        })
    }
}

struct DailyWriter {
    day: String,
    writer: csv::Writer<fs::File>,
}

/// Append-only outcome CSV, rotated per UTC day
pub struct OutcomeCsvLog {
    dir: PathBuf,
    current: Mutex<Option<DailyWriter>>,
}

impl OutcomeCsvLog {
    /// Create the `outcomes/` directory under `data_dir`
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref().join("outcomes");
        fs::create_dir_all(&dir).context("Failed to create outcomes directory")?;
        Ok(Self {
            dir,
            current: Mutex::new(None),
        })
    }

    fn file_for(&self, day: &str) -> PathBuf {
        self.dir.join(format!("outcomes_{}.csv", day))
    }

    fn create_writer(path: &Path) -> Result<csv::Writer<fs::File>> {
        let file_has_data =
            path.exists() && fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context("Failed to open CSV file")?;

        Ok(WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file))
    }

    /// Append one row and flush
    pub fn append(&self, record: &OutcomeRecord) -> Result<()> {
        let day = Utc::now().format("%Y-%m-%d").to_string();
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        if current.as_ref().map(|w| w.day != day).unwrap_or(true) {
            let writer = Self::create_writer(&self.file_for(&day))?;
            *current = Some(DailyWriter { day, writer });
        }

        if let Some(daily) = current.as_mut() {
            daily
                .writer
                .serialize(record)
                .context("Failed to write outcome record")?;
            daily
                .writer
                .flush()
                .context("Failed to flush outcome writer")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, ExitReason, SignalEntry, Targets};
    use csv::ReaderBuilder;

    fn temp_data_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "sigtrack_csv_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    fn resolved_signal(id: &str) -> TrackedSignal {
        let entry = SignalEntry {
            id: id.to_string(),
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Short,
            entry_price: 100.0,
            confidence: 60.0,
            volatility: 0.02,
        };
        let targets = Targets {
            tp1: 99.4,
            tp2: 98.8,
            tp3: 97.9,
            stop_loss: 101.12,
        };
        let mut signal = TrackedSignal::new(&entry, targets, Utc::now());
        signal.observe(99.3);
        signal.settle(99.3, ExitReason::Tp1, Utc::now());
        signal
    }

    #[test]
    fn monitoring_signal_has_no_record() {
        let mut signal = resolved_signal("a");
        signal.exit = None;
        assert!(OutcomeRecord::from_signal(&signal).is_none());
    }

    #[test]
    fn appended_rows_read_back_with_single_header() {
        let dir = temp_data_dir("append");
        let log = OutcomeCsvLog::new(&dir).unwrap();

        let first = OutcomeRecord::from_signal(&resolved_signal("sig-1")).unwrap();
        let second = OutcomeRecord::from_signal(&resolved_signal("sig-2")).unwrap();
        log.append(&first).unwrap();
        log.append(&second).unwrap();

        // A second handle on the same day must not write another header.
        let reopened = OutcomeCsvLog::new(&dir).unwrap();
        reopened.append(&first).unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(log.file_for(&today))
            .unwrap();
        let rows: Vec<OutcomeRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].signal_id, "sig-2");
        assert_eq!(rows[0].exit_reason, "TP1");
        assert_eq!(rows[0].result, "WIN");
        assert_eq!(rows[0].direction, "SHORT");

        let _ = fs::remove_dir_all(dir);
    }
}
