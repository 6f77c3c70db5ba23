//! Turns Voltronic response text into named fields.
//!
//! Fields are assigned positionally and never padded: a short response simply
//! yields fewer fields, extra tokens are ignored.

use crate::decoded::{Decoded, FieldValue};
use crate::voltronic::enums::{
    name_for, AcInputVoltageRange, BatteryType, ChargerSourcePriority, CodeName, OperatingMode,
    OutputSourcePriority, ParallelMode, StatusBitsB10B8, StatusBitsB7B0,
};

pub const EMPTY_RESPONSE: &str = "empty response";
pub const NULL_RESPONSE: &str = "null response received. Command not accepted.";
pub const NAK_RESPONSE: &str = "NAK response received. Command not accepted.";

pub const QPIGS_FIELDS: [&str; 24] = [
    "grid_voltage",
    "grid_frequency",
    "ac_output_voltage",
    "ac_output_frequency",
    "output_apparent_power",
    "output_active_power",
    "load_percent",
    "bus_voltage",
    "battery_voltage",
    "battery_charging_current",
    "battery_capacity",
    "inverter_heat_sink_temperature",
    "pv_input_current",
    "pv_input_voltage",
    "scc_battery_voltage",
    "battery_discharge_current",
    "device_status_bits_b7_b0",
    "battery_voltage_offset",
    "eeprom_version",
    "pv_charging_power",
    "device_status_bits_b10_b8",
    "reserved_a",
    "reserved_bb",
    "reserved_cccc",
];

pub const QPIGS2_FIELDS: [&str; 3] = ["pv_current", "pv_voltage", "pv_daily_energy"];

pub const QPIRI_FIELDS: [&str; 28] = [
    "rated_grid_voltage",
    "rated_input_current",
    "rated_ac_output_voltage",
    "rated_output_frequency",
    "rated_output_current",
    "rated_output_apparent_power",
    "rated_output_active_power",
    "rated_battery_voltage",
    "low_battery_to_ac_bypass_voltage",
    "shut_down_battery_voltage",
    "bulk_charging_voltage",
    "float_charging_voltage",
    "battery_type",
    "max_utility_charging_current",
    "max_charging_current",
    "ac_input_voltage_range",
    "output_source_priority",
    "charger_source_priority",
    "parallel_max_number",
    "reserved_uu",
    "reserved_v",
    "parallel_mode",
    "high_battery_voltage_to_battery_mode",
    "solar_work_condition_in_parallel",
    "solar_max_charging_power_auto_adjust",
    "rated_battery_capacity",
    "reserved_b",
    "reserved_ccc",
];

pub const QBEQI_FIELDS: [&str; 9] = [
    "equalization_function",
    "equalization_time",
    "interval_days",
    "max_charging_current",
    "float_voltage",
    "reserved_1",
    "equalization_timeout",
    "immediate_activation_flag",
    "elapsed_time",
];

/// Decodes `input` as the response to `command`.
///
/// Never fails: anything that cannot be interpreted becomes a `Decoded::Error`
/// or, for unrecognized commands, a single `Raw` field.
pub fn decode(command: &str, input: &str) -> Decoded {
    if input.is_empty() {
        return Decoded::error(EMPTY_RESPONSE);
    }
    if input == "null" {
        return Decoded::error(NULL_RESPONSE);
    }

    let text = if is_hex_string(input) {
        hex_to_ascii(input)
    } else {
        input.trim().to_string()
    };
    let text: String = text
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '\r' | '\n'))
        .collect();
    let text = text.trim();

    if text.is_empty() {
        return Decoded::error(EMPTY_RESPONSE);
    }
    if text.contains("NAK") {
        return Decoded::error(NAK_RESPONSE);
    }

    match command.trim().to_ascii_uppercase().as_str() {
        "QPIGS" => positional(&QPIGS_FIELDS, text, |_, v| v.to_string()),
        "QPIGS2" => positional(&QPIGS2_FIELDS, text, |_, v| v.to_string()),
        "QPIRI" => positional(&QPIRI_FIELDS, text, transform_qpiri_value),
        "QMOD" => decode_qmod(text),
        "QMN" => Decoded::new().with("Model", text),
        "QID" | "QSID" => Decoded::new().with("Device ID", text),
        "QFLAG" => Decoded::new().with("Enabled/Disabled Flags", text),
        "QVFW" => Decoded::new().with("Firmware Version", text.replace("VERFW:", "").trim()),
        "QBEQI" => positional(&QBEQI_FIELDS, text, |_, v| v.to_string()),
        _ => Decoded::new().with("Raw", text),
    }
}

fn positional(fields: &[&str], text: &str, transform: fn(usize, &str) -> String) -> Decoded {
    fields
        .iter()
        .zip(text.split_whitespace())
        .enumerate()
        .map(|(i, (field, value))| (field.to_string(), FieldValue::from(transform(i, value))))
        .collect()
}

/// Replaces enum codes at their QPIRI positions with names. Unknown codes and
/// every other position pass through untouched.
pub fn transform_qpiri_value(index: usize, value: &str) -> String {
    match index {
        12 => name_for::<BatteryType>(value),
        15 => name_for::<AcInputVoltageRange>(value),
        16 => name_for::<OutputSourcePriority>(value),
        17 => name_for::<ChargerSourcePriority>(value),
        21 => name_for::<ParallelMode>(value),
        _ => value.to_string(),
    }
}

fn decode_qmod(text: &str) -> Decoded {
    let mode = text
        .bytes()
        .next()
        .and_then(|b| OperatingMode::try_from(b).ok())
        .map(|m| m.name())
        .unwrap_or("Unknown");
    Decoded::new().with("operating_mode", mode)
}

/// True for hex dumps such as `"28 42 E7 C9"`: whitespace separated tokens of
/// exactly two hex digits. Plain digit strings like a device serial never match.
pub fn is_hex_string(s: &str) -> bool {
    let mut tokens = s.split_whitespace().peekable();
    tokens.peek().is_some()
        && tokens.all(|t| t.len() == 2 && t.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Decodes a hex dump to ASCII, dropping non-ASCII bytes and one leading `(`.
pub fn hex_to_ascii(s: &str) -> String {
    let text: String = s
        .split_whitespace()
        .filter_map(|t| u8::from_str_radix(t, 16).ok())
        .filter(|b| b.is_ascii())
        .map(|b| b as char)
        .collect();
    let text = text.trim();
    text.strip_prefix('(').unwrap_or(text).to_string()
}

/// Expands the status words of a decoded QPIGS response into individual flags,
/// appended after the positional fields. Missing words are left out.
pub fn with_status_flags(mut decoded: Decoded) -> Decoded {
    if let Some(raw) = decoded.get_str("device_status_bits_b7_b0").map(str::to_string) {
        let bits = StatusBitsB7B0::new(&raw);
        for (k, v) in bits.fields() {
            decoded.push(k, v);
        }
        decoded.push("_raw_b7_b0", bits.raw);
    }
    if let Some(raw) = decoded.get_str("device_status_bits_b10_b8").map(str::to_string) {
        let bits = StatusBitsB10B8::new(&raw);
        for (k, v) in bits.fields() {
            decoded.push(k, v);
        }
        decoded.push("_raw_b10_b8", bits.raw);
    }
    decoded
}
