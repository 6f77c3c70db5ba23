//! Setting (write) commands.
//!
//! Every setting has a Voltronic ASCII form. Only some have a Modbus holding
//! register; the rest are rejected on Modbus devices.

use crate::modbus::registers;
use crate::prelude::*;

use enum_dispatch::*;
use std::str::FromStr;

#[enum_dispatch]
pub trait SettingCommand {
    /// Key used on the command line and in logs, e.g. `battery_type`.
    fn key(&self) -> &'static str;
    /// ASCII command text, without CRC or terminator.
    fn ascii_command(&self) -> String;
    /// `(register, value)` for Modbus devices, if the setting maps to one.
    fn holding_register(&self) -> Option<(u16, u16)>;
}

#[enum_dispatch(SettingCommand)]
#[derive(Clone, Debug, PartialEq)]
pub enum Setting {
    BatteryType(BatteryTypeSetting),
    OutputPriority(OutputPrioritySetting),
    ChargerPriority(ChargerPrioritySetting),
    BulkChargingVoltage(BulkChargingVoltage),
    FloatChargingVoltage(FloatChargingVoltage),
    RatedBatteryVoltage(RatedBatteryVoltage),
    MaxChargingCurrent(MaxChargingCurrent),
    BatteryChargeCurrent(BatteryChargeCurrent),
    MaxUtilityChargingCurrent(MaxUtilityChargingCurrent),
}

fn tenths(v: f64) -> u16 {
    (v * 10.0).round() as u16
}

// {{{ BatteryTypeSetting
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatteryTypeSetting {
    Agm,
    Flooded,
    User,
    LiFePo4,
}

impl BatteryTypeSetting {
    fn code(&self) -> u16 {
        match self {
            Self::Agm => 0,
            Self::Flooded => 1,
            Self::User => 2,
            Self::LiFePo4 => 3,
        }
    }
}

impl SettingCommand for BatteryTypeSetting {
    fn key(&self) -> &'static str {
        "battery_type"
    }
    fn ascii_command(&self) -> String {
        format!("PBT{:02}", self.code())
    }
    fn holding_register(&self) -> Option<(u16, u16)> {
        Some((registers::BATTERY_TYPE, self.code()))
    }
}
// }}}

// {{{ OutputPrioritySetting
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputPrioritySetting {
    UtilityFirst,
    Sbu,
    SolarFirst,
}

impl SettingCommand for OutputPrioritySetting {
    fn key(&self) -> &'static str {
        "output_source_priority"
    }
    fn ascii_command(&self) -> String {
        match self {
            Self::UtilityFirst => "POP00",
            Self::Sbu => "POP01",
            Self::SolarFirst => "POP02",
        }
        .to_string()
    }
    // register 301 orders its codes differently from POPnn
    fn holding_register(&self) -> Option<(u16, u16)> {
        let value = match self {
            Self::UtilityFirst => 0,
            Self::SolarFirst => 1,
            Self::Sbu => 2,
        };
        Some((registers::OUTPUT_PRIORITY, value))
    }
}
// }}}

// {{{ ChargerPrioritySetting
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChargerPrioritySetting {
    UtilityFirst,
    SolarFirst,
    SolarAndUtility,
}

impl ChargerPrioritySetting {
    fn code(&self) -> u16 {
        match self {
            Self::UtilityFirst => 0,
            Self::SolarFirst => 1,
            Self::SolarAndUtility => 2,
        }
    }
}

impl SettingCommand for ChargerPrioritySetting {
    fn key(&self) -> &'static str {
        "charger_source_priority"
    }
    fn ascii_command(&self) -> String {
        format!("PCP{:02}", self.code())
    }
    fn holding_register(&self) -> Option<(u16, u16)> {
        Some((registers::CHARGER_PRIORITY, self.code()))
    }
}
// }}}

// {{{ numeric settings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BulkChargingVoltage(pub f64);

impl SettingCommand for BulkChargingVoltage {
    fn key(&self) -> &'static str {
        "bulk_charging_voltage"
    }
    fn ascii_command(&self) -> String {
        format!("PBAV{:.2}", self.0)
    }
    fn holding_register(&self) -> Option<(u16, u16)> {
        Some((registers::MAX_CHARGE_VOLTAGE, tenths(self.0)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatChargingVoltage(pub f64);

impl SettingCommand for FloatChargingVoltage {
    fn key(&self) -> &'static str {
        "float_charging_voltage"
    }
    fn ascii_command(&self) -> String {
        format!("PBFV{:.2}", self.0)
    }
    fn holding_register(&self) -> Option<(u16, u16)> {
        Some((registers::FLOAT_CHARGE_VOLTAGE, tenths(self.0)))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RatedBatteryVoltage(pub u16);

impl SettingCommand for RatedBatteryVoltage {
    fn key(&self) -> &'static str {
        "rated_battery_voltage"
    }
    fn ascii_command(&self) -> String {
        format!("PBRV{}", self.0)
    }
    fn holding_register(&self) -> Option<(u16, u16)> {
        None
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MaxChargingCurrent(pub u16);

impl SettingCommand for MaxChargingCurrent {
    fn key(&self) -> &'static str {
        "max_charging_current"
    }
    fn ascii_command(&self) -> String {
        format!("MCHGC{:03}", self.0)
    }
    fn holding_register(&self) -> Option<(u16, u16)> {
        Some((registers::MAX_CHARGING_CURRENT, self.0.saturating_mul(10)))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatteryChargeCurrent(pub u16);

impl SettingCommand for BatteryChargeCurrent {
    fn key(&self) -> &'static str {
        "battery_charge_current"
    }
    fn ascii_command(&self) -> String {
        format!("PBATC{:03}", self.0)
    }
    fn holding_register(&self) -> Option<(u16, u16)> {
        None
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MaxUtilityChargingCurrent(pub u16);

impl SettingCommand for MaxUtilityChargingCurrent {
    fn key(&self) -> &'static str {
        "max_utility_charging_current"
    }
    fn ascii_command(&self) -> String {
        format!("MUCHGC{:03}", self.0)
    }
    fn holding_register(&self) -> Option<(u16, u16)> {
        Some((registers::MAX_MAINS_CHARGING_CURRENT, self.0.saturating_mul(10)))
    }
}
// }}}

fn parse_voltage(key: &str, value: &str) -> Result<f64> {
    let v: f64 = value
        .parse()
        .map_err(|_| anyhow!("{}: {} is not a voltage", key, value))?;
    if !(v > 0.0 && v < 100.0) {
        bail!("{}: {} out of range", key, v);
    }
    Ok(v)
}

fn parse_current(key: &str, value: &str) -> Result<u16> {
    let a: u16 = value
        .parse()
        .map_err(|_| anyhow!("{}: {} is not a whole number of amps", key, value))?;
    if a > 999 {
        bail!("{}: {} out of range", key, a);
    }
    Ok(a)
}

impl FromStr for Setting {
    type Err = anyhow::Error;

    /// Parses `key=value`, e.g. `output_source_priority=SBU` or
    /// `bulk_charging_voltage=28.2`.
    fn from_str(s: &str) -> Result<Self> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("setting {} is not key=value", s))?;
        let key = key.trim();
        let value = value.trim();
        let lower = value.to_ascii_lowercase();

        let setting = match key {
            "battery_type" => Setting::from(match lower.as_str() {
                "agm" => BatteryTypeSetting::Agm,
                "flooded" => BatteryTypeSetting::Flooded,
                "user" | "userdefined" => BatteryTypeSetting::User,
                "lifepo4" | "lib" => BatteryTypeSetting::LiFePo4,
                _ => bail!("unknown battery type {}", value),
            }),
            "output_source_priority" => Setting::from(match lower.as_str() {
                "utilityfirst" | "utility" => OutputPrioritySetting::UtilityFirst,
                "sbu" => OutputPrioritySetting::Sbu,
                "solarfirst" | "solar" => OutputPrioritySetting::SolarFirst,
                _ => bail!("unknown output source priority {}", value),
            }),
            "charger_source_priority" => Setting::from(match lower.as_str() {
                "utilityfirst" | "utility" => ChargerPrioritySetting::UtilityFirst,
                "solarfirst" | "solar" => ChargerPrioritySetting::SolarFirst,
                "solarandutility" => ChargerPrioritySetting::SolarAndUtility,
                _ => bail!("unknown charger source priority {}", value),
            }),
            "bulk_charging_voltage" => BulkChargingVoltage(parse_voltage(key, value)?).into(),
            "float_charging_voltage" => FloatChargingVoltage(parse_voltage(key, value)?).into(),
            "rated_battery_voltage" => RatedBatteryVoltage(match value {
                "12" | "24" | "48" => value.parse()?,
                _ => bail!("rated_battery_voltage must be 12, 24 or 48"),
            })
            .into(),
            "max_charging_current" => MaxChargingCurrent(parse_current(key, value)?).into(),
            "battery_charge_current" => BatteryChargeCurrent(parse_current(key, value)?).into(),
            "max_utility_charging_current" => {
                MaxUtilityChargingCurrent(parse_current(key, value)?).into()
            }
            _ => bail!("unknown setting {}", key),
        };

        Ok(setting)
    }
}
