use serde_json::Value;

use crate::types::TempType;

/// Parameter code selecting the heating program.
pub(crate) const PROGRAM_SYN: &str = "PR001";

/// Parameter code for a circuit set-point. Circuits are addressed by
/// their 1-based number; suffix 02 is the day set-point, 03 the night
/// set-point.
pub(crate) fn temperature_syn(circuit_nr: u32, temp_type: TempType) -> String {
    let suffix = match temp_type {
        TempType::Day => "02",
        TempType::Night => "03",
    };
    format!("HK{}{suffix}", circuit_nr + 1)
}

/// What the device had to say about one write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AckOutcome {
    Acked,
    Rejected(String),
    Inconclusive,
}

/// Interpret a 200 body from the extended write endpoint. Newer firmware
/// answers JSON with an `ack` or `err` field; older firmware answers
/// plain text containing `OK` or some casing of `ack`.
pub(crate) fn classify_ack(body: &str) -> AckOutcome {
    match serde_json::from_str::<Value>(body) {
        Ok(status) => {
            if status.get("ack").is_some() {
                AckOutcome::Acked
            } else if let Some(err) = status.get("err") {
                AckOutcome::Rejected(err_reason(err))
            } else {
                AckOutcome::Inconclusive
            }
        }
        Err(_) => {
            if body.contains("OK") || body.to_lowercase().contains("ack") {
                AckOutcome::Acked
            } else {
                AckOutcome::Inconclusive
            }
        }
    }
}

fn err_reason(err: &Value) -> String {
    match err {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
