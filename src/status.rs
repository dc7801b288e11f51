use serde_json::Value;

use crate::types::{
    DeviceMeta, HeatingCircuit, SensorSnapshot, SensorValue, TemperatureConstraints,
};

/// Everything one status payload yields: the normalized snapshot plus the
/// device-level extras the endpoint carries alongside the telemetry.
pub(crate) struct StatusData {
    pub snapshot: SensorSnapshot,
    pub meta: Option<DeviceMeta>,
    pub circuits: Option<Vec<HeatingCircuit>>,
    pub constraints: Option<TemperatureConstraints>,
}

/// Map the consolidated JSON payload into sensor records. Absent fields
/// are skipped; nothing here fails.
pub(crate) fn parse_status(data: &Value) -> StatusData {
    let mut snapshot = SensorSnapshot::new();

    emit(&mut snapshot, data, "temp", "_Température chaudière", Some("°C"));
    emit(&mut snapshot, data, "ext_temp", "_Température extérieure", Some("°C"));
    emit(&mut snapshot, data, "co2", "_CO2", Some("%"));
    emit(&mut snapshot, data, "fumes", "_Fumées", Some("%"));
    emit(&mut snapshot, data, "fuel", "_Combustible", Some("%"));
    emit(&mut snapshot, data, "cleaning_in", "_Nettoyage dans", Some("h"));
    emit(&mut snapshot, data, "state", "_État", None);
    emit(&mut snapshot, data, "mode", "_Mode", None);
    emit(&mut snapshot, data, "name", "_Nom", None);
    emit(&mut snapshot, data, "timestamp", "_Dernière mise à jour", None);

    let meta = data.get("meta").map(|meta| {
        emit(&mut snapshot, meta, "sw_version", "_Version firmware", None);
        emit(&mut snapshot, meta, "sn", "_Numéro de série", None);
        emit(&mut snapshot, meta, "typ", "_Modèle", None);
        emit(&mut snapshot, meta, "language", "_Langue", None);
        DeviceMeta {
            sw_version: string_field(meta, "sw_version"),
            serial_number: string_field(meta, "sn"),
            model: string_field(meta, "typ"),
            language: string_field(meta, "language"),
        }
    });

    let circuits = data.get("heat_circ").and_then(Value::as_array).map(|arr| {
        arr.iter()
            .enumerate()
            .map(|(i, circuit)| {
                let prefix = format!("_Circuit {}", circuit_label(circuit, i));
                emit(&mut snapshot, circuit, "day_temp", &format!("{prefix} - Temp jour"), Some("°C"));
                emit(&mut snapshot, circuit, "night_temp", &format!("{prefix} - Temp nuit"), Some("°C"));
                emit(&mut snapshot, circuit, "mode", &format!("{prefix} - Mode"), None);
                HeatingCircuit {
                    nr: circuit.get("nr").and_then(Value::as_u64).unwrap_or(0) as u32,
                    name: circuit.get("name").and_then(Value::as_str).map(str::to_string),
                    day_temp: circuit.get("day_temp").and_then(Value::as_f64),
                    night_temp: circuit.get("night_temp").and_then(Value::as_f64),
                    mode: string_field(circuit, "mode"),
                }
            })
            .collect()
    });

    if let Some(arr) = data.get("water_circ").and_then(Value::as_array) {
        for (i, circuit) in arr.iter().enumerate() {
            let prefix = format!("_ECS {}", circuit_label(circuit, i));
            emit(&mut snapshot, circuit, "temp", &format!("{prefix} - Temp"), Some("°C"));
            emit(&mut snapshot, circuit, "mode", &format!("{prefix} - Mode"), None);
        }
    }

    if let Some(errors) = data.get("error").and_then(Value::as_array)
        && !errors.is_empty()
    {
        snapshot.insert(
            "_Erreurs actives",
            SensorValue::Int(errors.len() as i64),
            None,
        );
        for (i, error) in errors.iter().enumerate() {
            snapshot.insert(
                format!("_Erreur {i}"),
                SensorValue::Text(stringify(error)),
                None,
            );
        }
    }

    let constraints = data
        .get("heat_constraints")
        .map(|c| TemperatureConstraints {
            min: c.get("min").and_then(Value::as_f64).unwrap_or(15.0),
            max: c.get("max").and_then(Value::as_f64).unwrap_or(30.0),
            step: c.get("inc").and_then(Value::as_f64).unwrap_or(0.5),
        });

    StatusData {
        snapshot,
        meta,
        circuits,
        constraints,
    }
}

fn emit(snapshot: &mut SensorSnapshot, data: &Value, field: &str, key: &str, unit: Option<&str>) {
    if let Some(value) = data.get(field) {
        snapshot.insert(key, to_sensor_value(value), unit.map(str::to_string));
    }
}

fn to_sensor_value(value: &Value) -> SensorValue {
    match value {
        Value::Bool(b) => SensorValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SensorValue::Int(i)
            } else {
                n.as_f64()
                    .map(SensorValue::Float)
                    .unwrap_or_else(|| SensorValue::Text(n.to_string()))
            }
        }
        Value::String(s) => SensorValue::Text(s.clone()),
        other => SensorValue::Text(other.to_string()),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn string_field(data: &Value, field: &str) -> Option<String> {
    data.get(field).map(|v| stringify(v))
}

/// Circuits are labeled by their device-supplied name, falling back to
/// the positional index for unnamed entries.
fn circuit_label(circuit: &Value, index: usize) -> String {
    circuit
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| index.to_string())
}
