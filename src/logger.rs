use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::types::SensorSnapshot;

/// How much of each refresh ends up in the traffic log.
pub enum TrafficLogMode {
    /// Every refresh writes the complete snapshot.
    Full,
    /// Refreshes write only the records that changed since the previous
    /// one (the first refresh is logged in full).
    Changes,
}

pub(crate) struct TrafficLogger {
    mode: TrafficLogMode,
    file: File,
    previous: Option<SensorSnapshot>,
}

impl TrafficLogger {
    pub fn new(mode: TrafficLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: None,
        })
    }

    pub fn log_request(&mut self, path: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "path": path,
        });
        self.write_line(&entry);
    }

    pub fn log_write(&mut self, syn: &str, value: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "syn": syn,
            "value": value,
        });
        self.write_line(&entry);
    }

    pub fn log_refresh(&mut self, snapshot: &SensorSnapshot) {
        match self.mode {
            TrafficLogMode::Full => {
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "refresh",
                    "sensors": snapshot,
                });
                self.write_line(&entry);
            }
            TrafficLogMode::Changes => {
                let entry = match &self.previous {
                    None => json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "refresh",
                        "full": true,
                        "sensors": snapshot,
                    }),
                    Some(previous) => {
                        let mut changes: Vec<Value> = snapshot
                            .iter()
                            .filter(|&(key, record)| previous.get(key) != Some(record))
                            .map(|(key, record)| {
                                json!({
                                    "key": key,
                                    "old": previous.get(key),
                                    "new": record,
                                })
                            })
                            .collect();
                        for (key, record) in previous.iter() {
                            if !snapshot.contains_key(key) {
                                changes.push(json!({
                                    "key": key,
                                    "old": record,
                                    "new": null,
                                }));
                            }
                        }
                        json!({
                            "ts": Utc::now().to_rfc3339(),
                            "dir": "refresh",
                            "changes": changes,
                        })
                    }
                };
                self.write_line(&entry);
                self.previous = Some(snapshot.clone());
            }
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}
