use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One normalized sensor reading. Legacy values arrive as locale-dependent
/// text and are coerced by declared unit; status values keep their JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SensorValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SensorValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Int(v) => Some(*v as f64),
            SensorValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SensorValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Bool(b) => write!(f, "{b}"),
            SensorValue::Int(v) => write!(f, "{v}"),
            SensorValue::Float(v) => write!(f, "{v}"),
            SensorValue::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub value: SensorValue,
    pub unit: Option<String>,
}

/// The complete result of one refresh cycle, keyed by sensor label.
/// Replaced wholesale on every refresh, never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    records: HashMap<String, SensorRecord>,
}

impl SensorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(
        &mut self,
        key: impl Into<String>,
        value: SensorValue,
        unit: Option<String>,
    ) {
        self.records.insert(key.into(), SensorRecord { value, unit });
    }

    pub(crate) fn insert_missing(&mut self, key: String, record: SensorRecord) {
        self.records.entry(key).or_insert(record);
    }

    pub fn get(&self, key: &str) -> Option<&SensorRecord> {
        self.records.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SensorRecord)> {
        self.records.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    /// Best-effort guess of the active heating program: scans for a key
    /// containing "prog" and maps its value through the program table.
    /// Labels are device-supplied, so an unrelated sensor can match.
    pub fn current_program(&self) -> Option<Program> {
        for (key, record) in &self.records {
            if !key.to_lowercase().contains("prog") {
                continue;
            }
            match &record.value {
                SensorValue::Int(code) => {
                    if let Ok(code) = u8::try_from(*code)
                        && let Some(program) = Program::from_code(code)
                    {
                        return Some(program);
                    }
                }
                SensorValue::Text(text) => {
                    let text = text.to_lowercase();
                    for program in Program::ALL {
                        if text.contains(program.as_str()) {
                            return Some(program);
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }
}

impl IntoIterator for SensorSnapshot {
    type Item = (String, SensorRecord);
    type IntoIter = std::collections::hash_map::IntoIter<String, SensorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Device identity from the status endpoint's `meta` object. Absent on
/// legacy-only devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMeta {
    pub sw_version: Option<String>,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
}

/// One independently controllable heating zone. `nr` is the
/// device-assigned circuit number, not the position in the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatingCircuit {
    pub nr: u32,
    pub name: Option<String>,
    pub day_temp: Option<f64>,
    pub night_temp: Option<f64>,
    pub mode: Option<String>,
}

/// Allowed set-point range for circuit temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureConstraints {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for TemperatureConstraints {
    fn default() -> Self {
        Self {
            min: 15.0,
            max: 30.0,
            step: 0.5,
        }
    }
}

/// Heating programs accepted by the `PR001` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    Off,
    Normal,
    Heat,
    Lower,
}

impl Program {
    pub const ALL: [Program; 4] = [Program::Off, Program::Normal, Program::Heat, Program::Lower];

    pub fn code(&self) -> u8 {
        match self {
            Program::Off => 0,
            Program::Normal => 1,
            Program::Heat => 2,
            Program::Lower => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Program::Off),
            1 => Some(Program::Normal),
            2 => Some(Program::Heat),
            3 => Some(Program::Lower),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Program::Off => "off",
            Program::Normal => "normal",
            Program::Heat => "heat",
            Program::Lower => "lower",
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of a circuit's two set-points a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempType {
    Day,
    Night,
}

impl TempType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TempType::Day => "day",
            TempType::Night => "night",
        }
    }
}

/// API generation detected by the connection probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiGeneration {
    Modern,
    Legacy,
}
