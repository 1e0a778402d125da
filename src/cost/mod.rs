use thiserror::Error;

/// Hours in an average month (24 * 365 / 12)
pub const HOURS_PER_MONTH: f64 = 730.0;

pub const DEFAULT_KWH_LOW: f64 = 0.21519;
pub const DEFAULT_KWH_HIGH: f64 = 0.23678;
pub const DEFAULT_GAS_M3: f64 = 0.63661;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CostError {
    #[error("Price for {name} must be a positive number, got {value}")]
    InvalidPrice { name: &'static str, value: f64 },
}

/// Tariff band signalled by the meter in every telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tariff {
    Low,
    High,
}

impl Tariff {
    /// Map the meter's tariff indicator (0001 / 0002)
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Tariff::Low),
            2 => Some(Tariff::High),
            _ => None,
        }
    }

    pub fn short(&self) -> &'static str {
        match self {
            Tariff::Low => "L",
            Tariff::High => "H",
        }
    }
}

/// Prices are fixed for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTable {
    kwh_low: f64,
    kwh_high: f64,
    gas: f64,
}

fn check_price(name: &'static str, value: f64) -> Result<f64, CostError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(CostError::InvalidPrice { name, value })
    }
}

impl PriceTable {
    pub fn new(kwh_low: f64, kwh_high: f64, gas: f64) -> Result<Self, CostError> {
        Ok(PriceTable {
            kwh_low: check_price("kwh_low", kwh_low)?,
            kwh_high: check_price("kwh_high", kwh_high)?,
            gas: check_price("gas", gas)?,
        })
    }

    pub fn price(&self, tariff: Tariff) -> f64 {
        match tariff {
            Tariff::Low => self.kwh_low,
            Tariff::High => self.kwh_high,
        }
    }

    pub fn gas_price(&self) -> f64 {
        self.gas
    }

    /// Cost of one telegram's instantaneous power, returned power offsets the cost
    pub fn power_cost(&self, tariff: Tariff, power_in: f64, power_out: f64) -> f64 {
        let price = self.price(tariff);
        power_in * price - power_out * price
    }

    pub fn gas_monthly_cost(&self, gas_rate: f64) -> f64 {
        gas_rate * self.gas * HOURS_PER_MONTH
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        PriceTable { kwh_low: DEFAULT_KWH_LOW, kwh_high: DEFAULT_KWH_HIGH, gas: DEFAULT_GAS_M3 }
    }
}

pub fn monthly_projection(average: f64) -> f64 {
    average * HOURS_PER_MONTH
}
