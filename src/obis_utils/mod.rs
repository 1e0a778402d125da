use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

pub mod meter_definitions;

pub use meter_definitions::{MeterDefinition, MeterProfile};

/// Format of the 12 digit date-time values sent by the meter
pub const TIMESTAMP_FORMAT: &str = "%y%m%d%H%M%S";

lazy_static! {
    /* (YYMMDDhhmmss) with an optional DST flag, e.g. (121030140000) or (101209112500W) */
    static ref TIMESTAMP_RE: Regex = Regex::new(r"\((\d{12})[SW]?\)").unwrap();
    /* (0000.98*kW), (00123.456) or (12785.123*m3) */
    static ref DECIMAL_RE: Regex = Regex::new(r"\((\d+\.\d+)(?:\*[A-Za-z0-9]+)?\)").unwrap();
    /* (0002) */
    static ref CODE_RE: Regex = Regex::new(r"\((\d{4})\)").unwrap();
    /* A line starting with the next OBIS key, or the closing ! line */
    static ref FIELD_END_RE: Regex = Regex::new(r"(?m)^(?:(\d+-\d+:\d+\.\d+\.\d+)|!)").unwrap();
}

/// The three encodings a P1 telegram uses for values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Timestamp,
    Decimal,
    Code,
}

impl ValueShape {
    fn pattern(&self) -> &'static Regex {
        match self {
            ValueShape::Timestamp => &*TIMESTAMP_RE,
            ValueShape::Decimal => &*DECIMAL_RE,
            ValueShape::Code => &*CODE_RE,
        }
    }
}

/// An OBIS code together with the value shape expected behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObisKey {
    pub code: &'static str,
    pub shape: ValueShape,
}

impl ObisKey {
    pub const fn new(code: &'static str, shape: ValueShape) -> Self {
        ObisKey { code, shape }
    }

    pub fn description(&self) -> &'static str {
        get_obis_description(self.code).unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObisValue {
    Timestamp(NaiveDateTime),
    Decimal(f64),
    Code(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObisField {
    pub key: ObisKey,
    pub raw: String,
    pub value: ObisValue,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("OBIS key {0} not found in telegram")]
    Missing(&'static str),
    #[error("OBIS key {key} has malformed value '{raw}'")]
    Malformed { key: &'static str, raw: String },
    #[error("OBIS key {key} is a {actual:?} value, not {expected:?}")]
    WrongShape { key: &'static str, expected: ValueShape, actual: ValueShape },
}

/// The part of `rest` that still belongs to the field just found: everything
/// up to the line holding the next OBIS key or the end of the telegram.
fn field_region(rest: &str) -> &str {
    let end = FIELD_END_RE
        .captures_iter(rest)
        .find(|caps| caps.get(1).map_or(true, |code| validate_obis_code(code.as_str())))
        .and_then(|caps| caps.get(0))
        .map_or(rest.len(), |m| m.start());
    &rest[..end]
}

/// Locate `key` in the telegram and return the first value of the key's shape
/// belonging to it. The value does not have to be on the same line, older
/// meters put the gas volume on the line after its key, but the search never
/// runs into the next field.
pub fn find_value(telegram: &str, key: ObisKey) -> Result<ObisField, FieldError> {
    let begin = telegram.find(key.code).ok_or(FieldError::Missing(key.code))?;
    let region = field_region(&telegram[begin + key.code.len()..]);

    let caps = match key.shape.pattern().captures(region) {
        Some(caps) => caps,
        None => {
            let raw = region.split_whitespace().collect::<Vec<_>>().join(" ");
            return Err(FieldError::Malformed { key: key.code, raw });
        }
    };
    let raw = caps[1].to_string();

    let value = match key.shape {
        ValueShape::Timestamp => NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map(ObisValue::Timestamp)
            .map_err(|_| FieldError::Malformed { key: key.code, raw: raw.clone() })?,
        ValueShape::Decimal => raw.parse::<f64>()
            .map(ObisValue::Decimal)
            .map_err(|_| FieldError::Malformed { key: key.code, raw: raw.clone() })?,
        ValueShape::Code => raw.parse::<u16>()
            .map(ObisValue::Code)
            .map_err(|_| FieldError::Malformed { key: key.code, raw: raw.clone() })?,
    };

    debug!("Extracted {} ({}): {}", key.code, key.description(), raw);
    Ok(ObisField { key, raw, value })
}

pub fn decimal(telegram: &str, key: ObisKey) -> Result<f64, FieldError> {
    match find_value(telegram, key)?.value {
        ObisValue::Decimal(v) => Ok(v),
        _ => Err(FieldError::WrongShape { key: key.code, expected: ValueShape::Decimal, actual: key.shape }),
    }
}

pub fn timestamp(telegram: &str, key: ObisKey) -> Result<NaiveDateTime, FieldError> {
    match find_value(telegram, key)?.value {
        ObisValue::Timestamp(v) => Ok(v),
        _ => Err(FieldError::WrongShape { key: key.code, expected: ValueShape::Timestamp, actual: key.shape }),
    }
}

pub fn code(telegram: &str, key: ObisKey) -> Result<u16, FieldError> {
    match find_value(telegram, key)?.value {
        ObisValue::Code(v) => Ok(v),
        _ => Err(FieldError::WrongShape { key: key.code, expected: ValueShape::Code, actual: key.shape }),
    }
}

pub fn get_obis_description(obis_code: &str) -> Option<&'static str> {
    let descriptions = get_standard_obis_descriptions();
    descriptions.get(obis_code).copied()
}

pub fn get_standard_obis_descriptions() -> HashMap<&'static str, &'static str> {
    let mut map = HashMap::new();

    // Energy registers
    map.insert("1-0:1.8.1", "Active energy + (tariff 1)");
    map.insert("1-0:1.8.2", "Active energy + (tariff 2)");
    map.insert("1-0:2.8.1", "Active energy - (tariff 1)");
    map.insert("1-0:2.8.2", "Active energy - (tariff 2)");

    // Power values
    map.insert("1-0:1.7.0", "Active power + (total)");
    map.insert("1-0:2.7.0", "Active power - (total)");

    // Tariff indicator
    map.insert("0-0:96.14.0", "Tariff indicator");

    // Gas
    map.insert("0-1:24.2.0", "Gas volume");
    map.insert("0-1:24.2.1", "Gas volume with capture time");
    map.insert("0-1:24.3.0", "Gas capture time");

    map
}

pub fn validate_obis_code(code: &str) -> bool {
    // OBIS code format: A-B:C.D.E
    let parts: Vec<&str> = code.split(':').collect();
    if parts.len() != 2 {
        return false;
    }

    let ab_parts: Vec<&str> = parts[0].split('-').collect();
    if ab_parts.len() != 2 {
        return false;
    }

    let cde_parts: Vec<&str> = parts[1].split('.').collect();
    if cde_parts.len() != 3 {
        return false;
    }

    for part in ab_parts.iter().chain(cde_parts.iter()) {
        if part.parse::<u8>().is_err() {
            return false;
        }
    }

    true
}
