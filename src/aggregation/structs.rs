use crate::cost::Tariff;
use crate::obis_utils::FieldError;
use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

/// A cumulative gas meter reading with the capture time the meter reported
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterReading {
    pub volume: f64,
    pub read_at: NaiveDateTime,
}

/// Running sums between two flushes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateAccumulator {
    pub counter: u64,
    pub power_in: f64,
    pub power_out: f64,
    pub cost: f64,
}

impl AggregateAccumulator {
    pub fn reset(&mut self) {
        *self = AggregateAccumulator::default();
    }
}

/// Snapshot produced on every flush
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRecord {
    pub timestamp: i64,
    pub telegrams: u64,
    /// Average power drawn in W
    pub power_in: f64,
    /// Average power returned in W
    pub power_out: f64,
    /// Last known gas usage per 5 minutes
    pub gas_rate: f64,
    pub power_monthly_cost: f64,
    pub gas_monthly_cost: f64,
}

impl AggregateRecord {
    /// Whitespace separated line as written by the file sink
    pub fn to_line(&self) -> String {
        format!(
            "{:.6} {:.6} {:.6} {:.6} {:.6}\n",
            self.power_in, self.power_out, self.gas_rate, self.power_monthly_cost, self.gas_monthly_cost
        )
    }
}

/// Values pushed straight to a time-series sink in live mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InstantRecord {
    Power {
        timestamp: i64,
        power_in_w: f64,
        power_out_w: f64,
        /// Absent when the tariff of the telegram was unknown
        cost: Option<f64>,
    },
    Gas {
        /// Capture time reported by the gas meter
        timestamp: i64,
        volume_delta: f64,
        cost: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerSample {
    pub power_in: f64,
    pub power_out: f64,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasDelta {
    pub volume_delta: f64,
    pub seconds: i64,
    pub rate: f64,
    pub monthly_cost: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasUpdate {
    pub reading: MeterReading,
    pub delta: Option<GasDelta>,
}

/// Per telegram problems, none of them stop processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelegramIssue {
    #[error("Could not obtain kWh tariff: {0}")]
    TariffMissing(FieldError),
    #[error("Unknown kWh tariff {0}, cost of this telegram is excluded")]
    InvalidTariff(u16),
    #[error("Could not obtain kW: {0}")]
    PowerMissing(FieldError),
    #[error("Could not obtain gas usage: {0}")]
    GasMissing(FieldError),
    #[error("Gas reading at {new} is not later than {previous}, rate unchanged")]
    GasClockAnomaly { previous: NaiveDateTime, new: NaiveDateTime },
}

/// What a single telegram contributed
#[derive(Debug, Clone, PartialEq)]
pub struct TelegramReport {
    pub captured_at: i64,
    pub tariff: Option<Tariff>,
    pub power: Option<PowerSample>,
    pub gas: Option<GasUpdate>,
    pub issues: Vec<TelegramIssue>,
}

impl TelegramReport {
    pub fn instant_records(&self) -> Vec<InstantRecord> {
        let mut records = Vec::new();

        if let Some(power) = self.power {
            records.push(InstantRecord::Power {
                timestamp: self.captured_at,
                power_in_w: power.power_in * 1000.0,
                power_out_w: power.power_out * 1000.0,
                cost: power.cost,
            });
        }

        if let Some(GasUpdate { reading, delta: Some(delta) }) = self.gas {
            records.push(InstantRecord::Gas {
                timestamp: reading.read_at.and_utc().timestamp(),
                volume_delta: delta.volume_delta,
                cost: delta.cost,
            });
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_record_line_format() {
        let record = AggregateRecord {
            timestamp: 0,
            telegrams: 3,
            power_in: 1000.0,
            power_out: 0.0,
            gas_rate: 0.05,
            power_monthly_cost: 172.8494,
            gas_monthly_cost: 23.236265,
        };
        assert_eq!(record.to_line(), "1000.000000 0.000000 0.050000 172.849400 23.236265\n");
    }

    #[test]
    fn test_accumulator_reset() {
        let mut acc = AggregateAccumulator { counter: 4, power_in: 1.0, power_out: 2.0, cost: 3.0 };
        acc.reset();
        assert_eq!(acc, AggregateAccumulator::default());
    }

    #[test]
    fn test_instant_records() {
        let read_at = NaiveDate::from_ymd_opt(2012, 10, 30).unwrap().and_hms_opt(14, 0, 0).unwrap();
        let report = TelegramReport {
            captured_at: 1_000,
            tariff: Some(Tariff::High),
            power: Some(PowerSample { power_in: 0.5, power_out: 0.0, cost: Some(0.1) }),
            gas: Some(GasUpdate {
                reading: MeterReading { volume: 1.0, read_at },
                delta: Some(GasDelta { volume_delta: 0.1, seconds: 3600, rate: 0.00833, monthly_cost: 1.0, cost: 0.06 }),
            }),
            issues: Vec::new(),
        };

        let records = report.instant_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], InstantRecord::Power { timestamp: 1_000, power_in_w: 500.0, power_out_w: 0.0, cost: Some(0.1) });
        assert_eq!(records[1], InstantRecord::Gas { timestamp: read_at.and_utc().timestamp(), volume_delta: 0.1, cost: 0.06 });
    }

    #[test]
    fn test_instant_record_json() {
        let record = InstantRecord::Power { timestamp: 1, power_in_w: 2.0, power_out_w: 0.0, cost: None };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "power");
        assert!(json["cost"].is_null());
    }
}
