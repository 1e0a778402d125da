use super::{ObisKey, ValueShape};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Telegram dialects with a known, fixed OBIS key set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterProfile {
    /// DSMR 2.2, gas volume on the line following `0-1:24.3.0`
    Dsmr22,
    /// DSMR 4.x, gas volume and capture time share `0-1:24.2.1`
    Dsmr40,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeterDefinition {
    pub profile: MeterProfile,
    pub tariff: ObisKey,
    pub power_in: ObisKey,
    pub power_out: ObisKey,
    pub gas_volume: ObisKey,
    pub gas_time: ObisKey,
    /// Cumulative energy registers, carried by the telegram but not aggregated
    pub energy_registers: Vec<ObisKey>,
}

fn energy_registers() -> Vec<ObisKey> {
    vec![
        ObisKey::new("1-0:1.8.1", ValueShape::Decimal),
        ObisKey::new("1-0:1.8.2", ValueShape::Decimal),
        ObisKey::new("1-0:2.8.1", ValueShape::Decimal),
        ObisKey::new("1-0:2.8.2", ValueShape::Decimal),
    ]
}

pub fn get_dsmr22_definition() -> MeterDefinition {
    MeterDefinition {
        profile: MeterProfile::Dsmr22,
        tariff: ObisKey::new("0-0:96.14.0", ValueShape::Code),
        power_in: ObisKey::new("1-0:1.7.0", ValueShape::Decimal),
        power_out: ObisKey::new("1-0:2.7.0", ValueShape::Decimal),
        gas_volume: ObisKey::new("0-1:24.2.0", ValueShape::Decimal),
        gas_time: ObisKey::new("0-1:24.3.0", ValueShape::Timestamp),
        energy_registers: energy_registers(),
    }
}

pub fn get_dsmr40_definition() -> MeterDefinition {
    MeterDefinition {
        profile: MeterProfile::Dsmr40,
        tariff: ObisKey::new("0-0:96.14.0", ValueShape::Code),
        power_in: ObisKey::new("1-0:1.7.0", ValueShape::Decimal),
        power_out: ObisKey::new("1-0:2.7.0", ValueShape::Decimal),
        gas_volume: ObisKey::new("0-1:24.2.1", ValueShape::Decimal),
        gas_time: ObisKey::new("0-1:24.2.1", ValueShape::Timestamp),
        energy_registers: energy_registers(),
    }
}

impl MeterProfile {
    pub fn definition(&self) -> MeterDefinition {
        match self {
            MeterProfile::Dsmr22 => get_dsmr22_definition(),
            MeterProfile::Dsmr40 => get_dsmr40_definition(),
        }
    }
}

impl MeterDefinition {
    /// Read all cumulative energy registers present in the telegram
    pub fn read_energy_registers(&self, telegram: &str) -> HashMap<&'static str, f64> {
        self.energy_registers
            .iter()
            .filter_map(|key| super::decimal(telegram, *key).ok().map(|v| (key.code, v)))
            .collect()
    }
}

pub fn create_example_telegrams() -> HashMap<MeterProfile, String> {
    let mut examples = HashMap::new();

    let dsmr22_telegram = "/ISk5\\2ME382-1003\r
\r
0-0:96.1.1(4B414C37303035313135383132373132)\r
1-0:1.8.1(00136.939*kWh)\r
1-0:1.8.2(00117.432*kWh)\r
1-0:2.8.1(00000.000*kWh)\r
1-0:2.8.2(00000.000*kWh)\r
0-0:96.14.0(0002)\r
1-0:1.7.0(0000.98*kW)\r
1-0:2.7.0(0000.00*kW)\r
0-0:17.0.0(0999.00*kW)\r
0-0:96.3.10(1)\r
0-0:96.13.1()\r
0-0:96.13.0()\r
0-1:24.1.0(3)\r
0-1:96.1.0(3238313031453631373038333430323132)\r
0-1:24.3.0(121030140000)(00)(60)(1)(0-1:24.2.0)(m3)\r
(00123.456)\r
0-1:24.4.0(1)\r
!\r
";
    examples.insert(MeterProfile::Dsmr22, dsmr22_telegram.to_string());

    let dsmr40_telegram = "/KFM5KAIFA-METER\r
\r
1-3:0.2.8(42)\r
0-0:1.0.0(161113205757W)\r
1-0:1.8.1(001581.123*kWh)\r
1-0:1.8.2(001435.706*kWh)\r
1-0:2.8.1(000000.000*kWh)\r
1-0:2.8.2(000000.000*kWh)\r
0-0:96.14.0(0001)\r
1-0:1.7.0(02.027*kW)\r
1-0:2.7.0(00.000*kW)\r
0-1:24.1.0(003)\r
0-1:24.2.1(161113205500W)(02492.102*m3)\r
!583C\r
";
    examples.insert(MeterProfile::Dsmr40, dsmr40_telegram.to_string());

    examples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obis_utils::validate_obis_code;

    #[test]
    fn test_definitions_use_valid_codes() {
        for profile in [MeterProfile::Dsmr22, MeterProfile::Dsmr40] {
            let def = profile.definition();
            assert_eq!(def.profile, profile);
            for key in [def.tariff, def.power_in, def.power_out, def.gas_volume, def.gas_time] {
                assert!(validate_obis_code(key.code), "{} is not a valid OBIS code", key.code);
            }
        }
    }

    #[test]
    fn test_example_telegrams_carry_all_keys() {
        let examples = create_example_telegrams();
        for (profile, telegram) in examples.iter() {
            let def = profile.definition();
            assert!(crate::obis_utils::code(telegram, def.tariff).is_ok());
            assert!(crate::obis_utils::decimal(telegram, def.power_in).is_ok());
            assert!(crate::obis_utils::decimal(telegram, def.power_out).is_ok());
            assert!(crate::obis_utils::decimal(telegram, def.gas_volume).is_ok());
            assert!(crate::obis_utils::timestamp(telegram, def.gas_time).is_ok());
        }
    }

    #[test]
    fn test_dsmr40_gas_shares_key() {
        let examples = create_example_telegrams();
        let telegram = examples.get(&MeterProfile::Dsmr40).unwrap();
        let def = get_dsmr40_definition();
        assert_eq!(crate::obis_utils::decimal(telegram, def.gas_volume), Ok(2492.102));
    }

    #[test]
    fn test_read_energy_registers() {
        let examples = create_example_telegrams();
        let telegram = examples.get(&MeterProfile::Dsmr22).unwrap();
        let registers = get_dsmr22_definition().read_energy_registers(telegram);
        assert_eq!(registers.len(), 4);
        assert_eq!(registers.get("1-0:1.8.1"), Some(&136.939));
    }
}
