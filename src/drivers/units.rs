//! Display unit families for derived quantities.
//!
//! A value in SI base units is multiplied by the unit divisor, e.g. a current
//! of 8e-4 A shown in µA is `8e-4 * 1e6 = 800`.
use serde::{Deserialize, Serialize};
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentUnit {
    Amps,
    MilliAmps,
    #[default]
    MicroAmps,
    NanoAmps,
}
impl CurrentUnit {
    pub fn divisor(self) -> f64 {
        match self {
            CurrentUnit::Amps => 1.0,
            CurrentUnit::MilliAmps => 1.0e3,
            CurrentUnit::MicroAmps => 1.0e6,
            CurrentUnit::NanoAmps => 1.0e9,
        }
    }
    pub fn symbol(self) -> &'static str {
        match self {
            CurrentUnit::Amps => "A",
            CurrentUnit::MilliAmps => "mA",
            CurrentUnit::MicroAmps => "µA",
            CurrentUnit::NanoAmps => "nA",
        }
    }
}
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConductanceUnit {
    Siemens,
    #[default]
    MilliSiemens,
    MicroSiemens,
}
impl ConductanceUnit {
    pub fn divisor(self) -> f64 {
        match self {
            ConductanceUnit::Siemens => 1.0,
            ConductanceUnit::MilliSiemens => 1.0e3,
            ConductanceUnit::MicroSiemens => 1.0e6,
        }
    }
    pub fn symbol(self) -> &'static str {
        match self {
            ConductanceUnit::Siemens => "S",
            ConductanceUnit::MilliSiemens => "mS",
            ConductanceUnit::MicroSiemens => "µS",
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn divisors_scale_si_values() {
        assert!((8.0e-4 * CurrentUnit::MicroAmps.divisor() - 800.0).abs() < 1e-9);
        assert_eq!(CurrentUnit::MilliAmps.divisor(), 1000.0);
        assert_eq!(ConductanceUnit::MilliSiemens.divisor(), 1000.0);
        assert_eq!(ConductanceUnit::MicroSiemens.symbol(), "µS");
    }
    #[test]
    fn units_parse_from_config_names() {
        let unit: CurrentUnit = serde_json::from_str("\"nano_amps\"").unwrap();
        assert_eq!(unit, CurrentUnit::NanoAmps);
        let unit: ConductanceUnit = serde_json::from_str("\"siemens\"").unwrap();
        assert_eq!(unit, ConductanceUnit::Siemens);
    }
}
