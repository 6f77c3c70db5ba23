//! Holding register layout for SMG-II style Modbus inverters.
//!
//! Two contiguous blocks are read: live sensors at 201..=231 and configuration
//! at 300..=337. Addresses not listed below are reserved and skipped.

use crate::decoded::{Decoded, FieldValue};

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const SENSOR_BLOCK_START: u16 = 201;
pub const SENSOR_BLOCK_COUNT: u16 = 31;
pub const CONFIG_BLOCK_START: u16 = 300;
pub const CONFIG_BLOCK_COUNT: u16 = 38;

// writable configuration registers
pub const OUTPUT_PRIORITY: u16 = 301;
pub const BATTERY_TYPE: u16 = 322;
pub const MAX_CHARGE_VOLTAGE: u16 = 324;
pub const FLOAT_CHARGE_VOLTAGE: u16 = 325;
pub const CHARGER_PRIORITY: u16 = 331;
pub const MAX_CHARGING_CURRENT: u16 = 332;
pub const MAX_MAINS_CHARGING_CURRENT: u16 = 333;

/// How a raw register value becomes a field value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Conversion {
    Raw,
    Div10,
    Div100,
    /// Two's complement.
    Signed,
    SignedDiv10,
    /// Register 201 code, named via `OperationMode`.
    Mode,
}

impl Conversion {
    pub fn apply(&self, raw: u16) -> FieldValue {
        match self {
            Self::Raw => FieldValue::Integer(raw as i64),
            Self::Div10 => FieldValue::Number(raw as f64 / 10.0),
            Self::Div100 => FieldValue::Number(raw as f64 / 100.0),
            Self::Signed => FieldValue::Integer(signed(raw) as i64),
            Self::SignedDiv10 => FieldValue::Number(signed(raw) as f64 / 10.0),
            Self::Mode => match OperationMode::try_from(raw) {
                Ok(mode) => FieldValue::from(mode.name()),
                Err(_) => FieldValue::Integer(raw as i64),
            },
        }
    }
}

pub fn signed(raw: u16) -> i32 {
    if raw >= 0x8000 {
        raw as i32 - 0x10000
    } else {
        raw as i32
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum OperationMode {
    PowerOn = 0,
    Standby = 1,
    Mains = 2,
    OffGrid = 3,
    Bypass = 4,
    Charging = 5,
    Fault = 6,
}

impl OperationMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PowerOn => "Power On",
            Self::Standby => "Standby",
            Self::Mains => "Mains",
            Self::OffGrid => "Off-Grid",
            Self::Bypass => "Bypass",
            Self::Charging => "Charging",
            Self::Fault => "Fault",
        }
    }
}

pub struct RegisterField {
    pub address: u16,
    pub name: &'static str,
    pub conversion: Conversion,
}

const fn field(address: u16, name: &'static str, conversion: Conversion) -> RegisterField {
    RegisterField {
        address,
        name,
        conversion,
    }
}

use Conversion::*;

#[rustfmt::skip]
pub static SENSOR_FIELDS: &[RegisterField] = &[
    field(201, "operation_mode", Mode),
    field(202, "mains_voltage", Div10),
    field(203, "mains_frequency", Div100),
    field(204, "mains_power", Signed),
    field(205, "inverter_voltage", Div10),
    field(206, "inverter_current", Div10),
    field(207, "inverter_frequency", Div100),
    field(208, "inverter_power", Signed),
    field(209, "inverter_charge_power", Signed),
    field(210, "output_voltage", Div10),
    field(211, "output_current", Div10),
    field(212, "output_frequency", Div100),
    field(213, "output_active_power", Signed),
    field(214, "output_apparent_power", Raw),
    field(215, "battery_voltage", Div10),
    field(216, "battery_current", SignedDiv10),
    field(217, "battery_power", Signed),
    field(219, "pv_voltage", Div10),
    field(220, "pv_current", Div10),
    field(223, "pv_power", Raw),
    field(224, "pv_charge_power", Raw),
    field(225, "load_percent", Raw),
    field(226, "temp_dcdc", Signed),
    field(227, "temp_inverter", Signed),
    field(229, "battery_soc", Raw),
];

#[rustfmt::skip]
pub static CONFIG_FIELDS: &[RegisterField] = &[
    field(300, "output_mode", Raw),
    field(301, "output_priority", Raw),
    field(302, "input_voltage_range", Raw),
    field(303, "buzzer_mode", Raw),
    field(305, "lcd_backlight", Raw),
    field(306, "lcd_auto_return", Raw),
    field(307, "energy_saving_mode", Raw),
    field(308, "overload_auto_restart", Raw),
    field(309, "overtemp_auto_restart", Raw),
    field(310, "overload_transfer_to_bypass", Raw),
    field(313, "battery_eq_enabled", Raw),
    field(320, "output_voltage_setting", Div10),
    field(321, "output_freq_setting", Div100),
    field(322, "battery_type", Raw),
    field(323, "battery_ovp", Div10),
    field(324, "max_charge_voltage", Div10),
    field(325, "float_charge_voltage", Div10),
    field(326, "battery_discharge_recovery_mains", Div10),
    field(327, "battery_low_protection_mains", Div10),
    field(329, "battery_low_protection_offgrid", Div10),
    field(331, "battery_charging_priority", Raw),
    field(332, "max_charging_current", Div10),
    field(333, "max_mains_charging_current", Div10),
    field(334, "eq_charging_voltage", Div10),
    field(335, "eq_time_minutes", Raw),
    field(336, "eq_timeout", Raw),
    field(337, "eq_interval_days", Raw),
];

/// Register values read starting at `start`. The device may return fewer than
/// were asked for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegisterBlock {
    pub start: u16,
    pub values: Vec<u16>,
}

impl RegisterBlock {
    pub fn new(start: u16, values: Vec<u16>) -> Self {
        Self { start, values }
    }

    pub fn get(&self, address: u16) -> Option<u16> {
        let offset = address.checked_sub(self.start)?;
        self.values.get(offset as usize).copied()
    }

    /// Applies `fields`, skipping any whose address falls outside the values.
    pub fn decode(&self, fields: &[RegisterField]) -> Decoded {
        fields
            .iter()
            .filter_map(|f| {
                self.get(f.address)
                    .map(|raw| (f.name.to_string(), f.conversion.apply(raw)))
            })
            .collect()
    }
}

pub fn decode_sensors(block: &RegisterBlock) -> Decoded {
    block.decode(SENSOR_FIELDS)
}

pub fn decode_config(block: &RegisterBlock) -> Decoded {
    block.decode(CONFIG_FIELDS)
}
