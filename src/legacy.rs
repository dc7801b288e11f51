use crate::types::{SensorSnapshot, SensorValue};

/// Switched-on tokens across the firmware languages (German, English,
/// French). Matched exactly against the trimmed raw value.
const TRUE_TOKENS: &[&str] = &["AN", "ON", "MARCHE"];
const FALSE_TOKENS: &[&str] = &["AUS", "OFF", "ARRÊT"];

/// Placeholder rows the device pads its data tables with.
const EXCLUDED_KEYS: &[&str] = &["reserved", "réservé", "reserviert"];

const FLOAT_UNITS: &[&str] = &["°C", "%"];
const INT_UNITS: &[&str] = &["d", "h"];

/// Split a raw payload into lines, dropping the final element: the device
/// terminates every response with a trailing artifact line.
fn payload_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    lines.pop();
    lines
}

/// Parse the paired description and value payloads in lockstep.
///
/// Line *i* of the description stream (`key;unit`) labels line *i* of the
/// value stream. Extra lines on either side are ignored; a description
/// line without exactly two `;`-separated fields skips that index.
pub(crate) fn parse_legacy(descriptions: &str, values: &str) -> SensorSnapshot {
    let mut snapshot = SensorSnapshot::new();

    for (desc, raw) in payload_lines(descriptions)
        .into_iter()
        .zip(payload_lines(values))
    {
        let mut fields = desc.split(';');
        let (key, unit) = match (fields.next(), fields.next(), fields.next()) {
            (Some(key), Some(unit), None) => (key, unit),
            _ => continue,
        };

        if EXCLUDED_KEYS.contains(&key.to_lowercase().as_str()) {
            continue;
        }

        let unit = Some(unit.trim()).filter(|u| !u.is_empty());
        let value = coerce_value(raw.trim(), unit);
        snapshot.insert(key, value, unit.map(str::to_string));
    }

    snapshot
}

/// Coercion priority: boolean tokens, then unit-driven numeric parsing
/// with raw-text fallback, then raw text. A single unparseable value
/// never fails the whole payload.
fn coerce_value(raw: &str, unit: Option<&str>) -> SensorValue {
    if TRUE_TOKENS.contains(&raw) {
        return SensorValue::Bool(true);
    }
    if FALSE_TOKENS.contains(&raw) {
        return SensorValue::Bool(false);
    }

    match unit {
        Some(u) if FLOAT_UNITS.contains(&u) => raw
            .parse::<f64>()
            .map(SensorValue::Float)
            .unwrap_or_else(|_| SensorValue::Text(raw.to_string())),
        Some(u) if INT_UNITS.contains(&u) => raw
            .parse::<f64>()
            .map(|v| SensorValue::Int(v as i64))
            .unwrap_or_else(|_| SensorValue::Text(raw.to_string())),
        _ => SensorValue::Text(raw.to_string()),
    }
}
