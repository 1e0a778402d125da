use crate::cost::{monthly_projection, PriceTable, Tariff};
use crate::obis_utils::{self, MeterDefinition};
use crate::telegram::Telegram;
use log::{debug, info, log_enabled, warn, Level};
use thiserror::Error;

pub mod structs;

pub use structs::*;

/// Gas rates are normalised to a five minute window
pub const GAS_RATE_WINDOW_SECS: f64 = 300.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Flush requested without any parsed telegram")]
    EmptyFlush,
}

#[derive(Debug, Clone, Default)]
struct GasState {
    previous: Option<MeterReading>,
    rate: f64,
    monthly_cost: f64,
}

/// Consumes telegrams and turns them into averaged usage and cost records.
///
/// Power sums are reset on every flush, the gas baseline is not: gas
/// readings arrive far less often than telegrams and the rate has to be
/// derived across flush boundaries.
pub struct AggregationEngine {
    definition: MeterDefinition,
    prices: PriceTable,
    acc: AggregateAccumulator,
    gas: GasState,
}

impl AggregationEngine {
    pub fn new(definition: MeterDefinition, prices: PriceTable) -> Self {
        AggregationEngine {
            definition,
            prices,
            acc: AggregateAccumulator::default(),
            gas: GasState::default(),
        }
    }

    pub fn counter(&self) -> u64 {
        self.acc.counter
    }

    pub fn accumulator(&self) -> &AggregateAccumulator {
        &self.acc
    }

    pub fn previous_gas_reading(&self) -> Option<MeterReading> {
        self.gas.previous
    }

    pub fn gas_rate(&self) -> f64 {
        self.gas.rate
    }

    pub fn parse(&mut self, telegram: &Telegram) -> TelegramReport {
        let msg = telegram.raw.as_str();
        let mut issues = Vec::new();

        // 1. Tariff
        let tariff = match obis_utils::code(msg, self.definition.tariff) {
            Ok(code) => {
                let tariff = Tariff::from_code(code);
                if tariff.is_none() {
                    issues.push(TelegramIssue::InvalidTariff(code));
                }
                tariff
            }
            Err(e) => {
                issues.push(TelegramIssue::TariffMissing(e));
                None
            }
        };

        // 2. + 3. Power in/out and its cost
        let power_in = obis_utils::decimal(msg, self.definition.power_in);
        let power_out = obis_utils::decimal(msg, self.definition.power_out);
        let power = match (power_in, power_out) {
            (Ok(power_in), Ok(power_out)) => {
                let cost = tariff.map(|t| self.prices.power_cost(t, power_in, power_out));
                self.acc.power_in += power_in;
                self.acc.power_out += power_out;
                if let Some(cost) = cost {
                    self.acc.cost += cost;
                }
                Some(PowerSample { power_in, power_out, cost })
            }
            (Err(e), _) | (_, Err(e)) => {
                issues.push(TelegramIssue::PowerMissing(e));
                None
            }
        };

        // 4. Gas
        let gas = self.parse_gas(msg, &mut issues);

        // 5.
        self.acc.counter += 1;

        for issue in issues.iter() {
            warn!("Telegram {} at {}: {}", telegram.identification(), telegram.captured_at, issue);
        }

        if log_enabled!(Level::Debug) {
            debug!("Energy registers: {:?}", self.definition.read_energy_registers(msg));
        }

        info!(
            "r {} {} {} {}",
            power.map(|p| p.power_in.to_string()).unwrap_or("-".to_string()),
            power.map(|p| p.power_out.to_string()).unwrap_or("-".to_string()),
            gas.map(|g| g.reading.volume.to_string()).unwrap_or("-".to_string()),
            tariff.map(|t| t.short()).unwrap_or("?"),
        );

        TelegramReport {
            captured_at: telegram.captured_at,
            tariff,
            power,
            gas,
            issues,
        }
    }

    fn parse_gas(&mut self, msg: &str, issues: &mut Vec<TelegramIssue>) -> Option<GasUpdate> {
        let volume = obis_utils::decimal(msg, self.definition.gas_volume);
        let read_at = obis_utils::timestamp(msg, self.definition.gas_time);

        let reading = match (volume, read_at) {
            (Ok(volume), Ok(read_at)) => MeterReading { volume, read_at },
            (Err(e), _) | (_, Err(e)) => {
                issues.push(TelegramIssue::GasMissing(e));
                return None;
            }
        };

        let mut delta = None;
        if let Some(previous) = self.gas.previous {
            let seconds = (reading.read_at - previous.read_at).num_seconds();
            if seconds > 0 {
                let volume_delta = reading.volume - previous.volume;
                let rate = volume_delta / (seconds as f64 / GAS_RATE_WINDOW_SECS);
                let monthly_cost = self.prices.gas_monthly_cost(rate);
                self.gas.rate = rate;
                self.gas.monthly_cost = monthly_cost;

                let d = GasDelta {
                    volume_delta,
                    seconds,
                    rate,
                    monthly_cost,
                    cost: volume_delta * self.prices.gas_price(),
                };
                info!("g {} {} {}", reading.read_at, d.volume_delta, d.cost);
                delta = Some(d);
            } else if reading.read_at < previous.read_at {
                issues.push(TelegramIssue::GasClockAnomaly { previous: previous.read_at, new: reading.read_at });
            }
        }

        /* The baseline always moves, even when no rate could be derived */
        self.gas.previous = Some(reading);

        Some(GasUpdate { reading, delta })
    }

    /// Drop the power sums without producing a record, the gas baseline stays
    pub fn discard(&mut self) {
        self.acc.reset();
    }

    pub fn flush(&mut self, now: i64) -> Result<AggregateRecord, EngineError> {
        if self.acc.counter == 0 {
            return Err(EngineError::EmptyFlush);
        }

        let counter = self.acc.counter as f64;
        let record = AggregateRecord {
            timestamp: now,
            telegrams: self.acc.counter,
            power_in: self.acc.power_in / counter * 1000.0,
            power_out: self.acc.power_out / counter * 1000.0,
            gas_rate: self.gas.rate,
            power_monthly_cost: monthly_projection(self.acc.cost / counter),
            gas_monthly_cost: self.gas.monthly_cost,
        };

        debug!("Flushing {} telegrams: {:?}", self.acc.counter, record);
        self.acc.reset();

        Ok(record)
    }
}
