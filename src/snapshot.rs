//! Typed views over decoded telemetry, one per protocol family.

use crate::decoded::Decoded;
use crate::voltronic::enums::{StatusBitsB10B8, StatusBitsB7B0};

use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InverterSensorData {
    pub grid_voltage: f64,
    pub grid_frequency: f64,
    pub ac_output_voltage: f64,
    pub ac_output_frequency: f64,
    pub output_apparent_power: f64,
    pub output_active_power: f64,
    pub load_percent: f64,
    pub bus_voltage: f64,
    pub battery_voltage: f64,
    /// Positive while charging.
    pub battery_current: f64,
    pub battery_power: f64,
    pub battery_capacity: f64,
    pub inverter_heat_sink_temperature: f64,
    pub pv_input_current: f64,
    pub pv_input_voltage: f64,
    pub pv_charging_power: f64,
    pub fault: bool,
    pub line_fail: bool,
    pub battery_low: bool,
    pub inverter_on: bool,
    pub charging_to_battery: bool,
    pub charging_ac_active: bool,
    pub charging_scc_active: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InverterSettings {
    pub output_source_priority: String,
    pub charger_source_priority: String,
    pub battery_type: String,
    pub bulk_charging_voltage: f64,
    pub float_charging_voltage: f64,
    pub max_charging_current: f64,
    pub max_utility_charging_current: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InverterRatedParams {
    pub rated_grid_voltage: f64,
    pub rated_input_current: f64,
    pub rated_ac_output_voltage: f64,
    pub rated_output_frequency: f64,
    pub rated_output_current: f64,
    pub rated_output_apparent_power: f64,
    pub rated_output_active_power: f64,
    pub rated_battery_voltage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InverterSnapshot {
    pub name: String,
    pub sensors: Option<InverterSensorData>,
    pub settings: Option<InverterSettings>,
    pub rated: Option<InverterRatedParams>,
    pub stale: bool,
    pub updated_at: DateTime<Local>,
}

fn num(d: &Decoded, key: &str) -> f64 {
    d.get_f64(key).unwrap_or(0.0)
}

fn text(d: &Decoded, key: &str) -> String {
    d.get(key).map(|v| v.to_string()).unwrap_or_default()
}

impl InverterSensorData {
    /// From a decoded QPIGS response.
    pub fn from_qpigs(d: &Decoded) -> Option<Self> {
        if d.is_error() || d.is_empty() {
            return None;
        }

        let charge = num(d, "battery_charging_current");
        let discharge = num(d, "battery_discharge_current");
        let battery_voltage = num(d, "battery_voltage");

        let b7_b0 = StatusBitsB7B0::new(d.get_str("device_status_bits_b7_b0").unwrap_or(""));
        let b10_b8 = StatusBitsB10B8::new(d.get_str("device_status_bits_b10_b8").unwrap_or(""));

        Some(Self {
            grid_voltage: num(d, "grid_voltage"),
            grid_frequency: num(d, "grid_frequency"),
            ac_output_voltage: num(d, "ac_output_voltage"),
            ac_output_frequency: num(d, "ac_output_frequency"),
            output_apparent_power: num(d, "output_apparent_power"),
            output_active_power: num(d, "output_active_power"),
            load_percent: num(d, "load_percent"),
            bus_voltage: num(d, "bus_voltage"),
            battery_voltage,
            battery_current: charge - discharge,
            battery_power: battery_voltage * (charge - discharge),
            battery_capacity: num(d, "battery_capacity"),
            inverter_heat_sink_temperature: num(d, "inverter_heat_sink_temperature"),
            pv_input_current: num(d, "pv_input_current"),
            pv_input_voltage: num(d, "pv_input_voltage"),
            pv_charging_power: num(d, "pv_charging_power"),
            fault: b7_b0.fault,
            line_fail: b7_b0.line_fail,
            battery_low: b7_b0.battery_low,
            inverter_on: b7_b0.inverter_on,
            charging_to_battery: b10_b8.charging_to_battery,
            charging_ac_active: b10_b8.charging_ac_active,
            charging_scc_active: b10_b8.charging_scc_active,
        })
    }

    /// From a decoded Modbus sensor block. Battery power is the inverter's own
    /// signed register, not derived from current.
    pub fn from_modbus(d: &Decoded) -> Option<Self> {
        if d.is_error() || d.is_empty() {
            return None;
        }

        let battery_current = num(d, "battery_current");
        let mode = d.get_str("operation_mode").unwrap_or("");

        Some(Self {
            grid_voltage: num(d, "mains_voltage"),
            grid_frequency: num(d, "mains_frequency"),
            ac_output_voltage: num(d, "output_voltage"),
            ac_output_frequency: num(d, "output_frequency"),
            output_apparent_power: num(d, "output_apparent_power"),
            output_active_power: num(d, "output_active_power"),
            load_percent: num(d, "load_percent"),
            bus_voltage: num(d, "inverter_voltage"),
            battery_voltage: num(d, "battery_voltage"),
            battery_current,
            battery_power: num(d, "battery_power"),
            battery_capacity: num(d, "battery_soc"),
            inverter_heat_sink_temperature: num(d, "temp_inverter"),
            pv_input_current: num(d, "pv_current"),
            pv_input_voltage: num(d, "pv_voltage"),
            pv_charging_power: num(d, "pv_charge_power"),
            fault: mode == "Fault",
            line_fail: mode == "Off-Grid",
            battery_low: false,
            inverter_on: num(d, "output_voltage") > 0.0,
            charging_to_battery: battery_current > 0.0,
            charging_ac_active: battery_current > 0.0 && mode == "Mains",
            charging_scc_active: num(d, "pv_charge_power") > 0.0,
        })
    }
}

impl InverterSettings {
    /// From a decoded QPIRI response.
    pub fn from_qpiri(d: &Decoded) -> Option<Self> {
        if d.is_error() || d.is_empty() {
            return None;
        }

        Some(Self {
            output_source_priority: text(d, "output_source_priority"),
            charger_source_priority: text(d, "charger_source_priority"),
            battery_type: text(d, "battery_type"),
            bulk_charging_voltage: num(d, "bulk_charging_voltage"),
            float_charging_voltage: num(d, "float_charging_voltage"),
            max_charging_current: num(d, "max_charging_current"),
            max_utility_charging_current: num(d, "max_utility_charging_current"),
        })
    }

    /// From a decoded Modbus config block, with enum codes named the way the
    /// ASCII protocol names them.
    pub fn from_modbus(d: &Decoded) -> Option<Self> {
        Self::from_qpiri(&crate::modbus::mimicry::qpiri(d))
    }
}

impl InverterRatedParams {
    pub fn from_qpiri(d: &Decoded) -> Option<Self> {
        if d.is_error() || d.is_empty() {
            return None;
        }

        Some(Self {
            rated_grid_voltage: num(d, "rated_grid_voltage"),
            rated_input_current: num(d, "rated_input_current"),
            rated_ac_output_voltage: num(d, "rated_ac_output_voltage"),
            rated_output_frequency: num(d, "rated_output_frequency"),
            rated_output_current: num(d, "rated_output_current"),
            rated_output_apparent_power: num(d, "rated_output_apparent_power"),
            rated_output_active_power: num(d, "rated_output_active_power"),
            rated_battery_voltage: num(d, "rated_battery_voltage"),
        })
    }
}
