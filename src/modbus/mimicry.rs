//! Presents Modbus register maps in the shape of Voltronic QPIGS / QPIRI / QMOD
//! responses, formatted with the same fixed widths the ASCII firmware uses.

use crate::decoded::Decoded;
use crate::voltronic::enums::{
    name_for, AcInputVoltageRange, BatteryType, ChargerSourcePriority, CodeName, OperatingMode,
    OutputSourcePriority, StatusBitsB10B8, StatusBitsB7B0,
};

/// Source register field and output format for one mimicked ASCII field.
enum Source {
    /// `{:0w$.p$}`
    Fixed(&'static str, usize, usize),
    /// `{:0w$}` of the rounded value
    Whole(&'static str, usize),
    /// Digit code mapped through an ASCII enum.
    Code(&'static str, fn(&str) -> String),
    Literal(&'static str),
}

fn fixed(v: f64, width: usize, precision: usize) -> String {
    format!("{:0width$.precision$}", v, width = width, precision = precision)
}

fn whole(v: f64, width: usize) -> String {
    format!("{:0width$}", v.round() as i64, width = width)
}

fn render(sources: &[(&str, Source)], registers: &Decoded) -> Decoded {
    let mut out = Decoded::new();
    for (name, source) in sources {
        let value = match source {
            Source::Fixed(reg, w, p) => registers.get_f64(reg).map(|v| fixed(v, *w, *p)),
            Source::Whole(reg, w) => registers.get_f64(reg).map(|v| whole(v, *w)),
            Source::Code(reg, map) => registers
                .get_f64(reg)
                .map(|v| map(&(v.round() as i64).to_string())),
            Source::Literal(s) => Some(s.to_string()),
        };
        if let Some(value) = value {
            out.push(*name, value);
        }
    }
    out
}

/// Splits a signed battery current (positive = charging) into the two
/// non-negative ASCII fields.
pub fn split_battery_current(current: f64) -> (f64, f64) {
    (current.max(0.0), (-current).max(0.0))
}

/// Reduces a Modbus operation mode name to the single-character ASCII mode.
pub fn mode_code(name: &str) -> Option<u8> {
    let name = name.to_ascii_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| name.contains(w));

    if has(&["fault"]) {
        Some(b'F')
    } else if has(&["off-grid", "off grid", "battery", "inverter"]) {
        Some(b'B')
    } else if has(&["mains", "bypass", "line", "grid"]) {
        Some(b'L')
    } else if has(&["standby", "charging"]) {
        Some(b'S')
    } else if has(&["power on"]) {
        Some(b'P')
    } else {
        None
    }
}

fn status_bits(sensors: &Decoded) -> (String, String) {
    let battery = sensors.get_f64("battery_current").unwrap_or(0.0);
    let mode = sensors.get_str("operation_mode").and_then(mode_code);

    let b7_b0 = StatusBitsB7B0 {
        fault: mode == Some(b'F'),
        line_fail: mode == Some(b'B'),
        inverter_on: sensors.get_f64("output_voltage").unwrap_or(0.0) > 0.0,
        ..Default::default()
    };
    let b10_b8 = StatusBitsB10B8 {
        charging_to_battery: battery > 0.0,
        charging_ac_active: battery > 0.0 && mode == Some(b'L'),
        charging_scc_active: sensors.get_f64("pv_charge_power").unwrap_or(0.0) > 0.0,
        ..Default::default()
    };
    (b7_b0.to_bits(), b10_b8.to_bits())
}

/// QPIGS-shaped map from a decoded sensor block.
pub fn qpigs(sensors: &Decoded) -> Decoded {
    if sensors.is_error() {
        return sensors.clone();
    }

    use Source::*;
    let mut out = render(
        &[
            ("grid_voltage", Fixed("mains_voltage", 5, 1)),
            ("grid_frequency", Fixed("mains_frequency", 4, 1)),
            ("ac_output_voltage", Fixed("output_voltage", 5, 1)),
            ("ac_output_frequency", Fixed("output_frequency", 4, 1)),
            ("output_apparent_power", Whole("output_apparent_power", 4)),
            ("output_active_power", Whole("output_active_power", 4)),
            ("load_percent", Whole("load_percent", 3)),
            ("bus_voltage", Whole("inverter_voltage", 3)),
            ("battery_voltage", Fixed("battery_voltage", 5, 2)),
        ],
        sensors,
    );

    let current = sensors.get_f64("battery_current");
    if let Some((charge, _)) = current.map(split_battery_current) {
        out.push("battery_charging_current", whole(charge, 3));
    }

    let tail = render(
        &[
            ("battery_capacity", Whole("battery_soc", 3)),
            ("inverter_heat_sink_temperature", Whole("temp_inverter", 4)),
            ("pv_input_current", Fixed("pv_current", 5, 1)),
            ("pv_input_voltage", Fixed("pv_voltage", 5, 1)),
            ("scc_battery_voltage", Fixed("battery_voltage", 5, 2)),
        ],
        sensors,
    );
    if let Decoded::Fields(fields) = tail {
        for (k, v) in fields {
            out.push(k, v);
        }
    }

    if let Some((_, discharge)) = current.map(split_battery_current) {
        out.push("battery_discharge_current", whole(discharge, 5));
    }

    let (b7_b0, b10_b8) = status_bits(sensors);
    out.push("device_status_bits_b7_b0", b7_b0);
    out.push("battery_voltage_offset", "00");
    out.push("eeprom_version", "00");
    if let Some(v) = sensors.get_f64("pv_charge_power") {
        out.push("pv_charging_power", whole(v, 5));
    }
    out.push("device_status_bits_b10_b8", b10_b8);
    out
}

/// QPIRI-shaped map from a decoded configuration block.
pub fn qpiri(config: &Decoded) -> Decoded {
    if config.is_error() {
        return config.clone();
    }

    use Source::*;
    render(
        &[
            ("rated_grid_voltage", Fixed("output_voltage_setting", 5, 1)),
            ("rated_input_current", Fixed("max_mains_charging_current", 4, 1)),
            ("rated_ac_output_voltage", Fixed("output_voltage_setting", 5, 1)),
            ("rated_output_frequency", Fixed("output_freq_setting", 4, 1)),
            ("rated_output_current", Fixed("max_charging_current", 4, 1)),
            ("rated_output_apparent_power", Literal("0000")),
            ("rated_output_active_power", Literal("0000")),
            ("rated_battery_voltage", Fixed("battery_ovp", 4, 1)),
            ("low_battery_to_ac_bypass_voltage", Fixed("battery_discharge_recovery_mains", 4, 1)),
            ("shut_down_battery_voltage", Fixed("battery_low_protection_offgrid", 4, 1)),
            ("bulk_charging_voltage", Fixed("max_charge_voltage", 4, 1)),
            ("float_charging_voltage", Fixed("float_charge_voltage", 4, 1)),
            ("battery_type", Code("battery_type", name_for::<BatteryType>)),
            ("max_utility_charging_current", Whole("max_mains_charging_current", 2)),
            ("max_charging_current", Whole("max_charging_current", 3)),
            ("ac_input_voltage_range", Code("input_voltage_range", name_for::<AcInputVoltageRange>)),
            ("output_source_priority", Code("output_priority", name_for::<OutputSourcePriority>)),
            ("charger_source_priority", Code("battery_charging_priority", name_for::<ChargerSourcePriority>)),
            ("high_battery_voltage_to_battery_mode", Fixed("max_charge_voltage", 4, 1)),
        ],
        config,
    )
}

/// QMOD-shaped map from a decoded sensor block.
pub fn qmod(sensors: &Decoded) -> Decoded {
    if sensors.is_error() {
        return sensors.clone();
    }

    let mode = sensors
        .get_str("operation_mode")
        .and_then(mode_code)
        .and_then(|c| OperatingMode::try_from(c).ok())
        .map(|m| m.name())
        .unwrap_or("Unknown");
    Decoded::new().with("operating_mode", mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoded::FieldValue;
    use crate::voltronic::decoder::{self, QPIGS_FIELDS};

    fn sensors() -> Decoded {
        Decoded::new()
            .with("operation_mode", "Off-Grid")
            .with("mains_voltage", 0.0)
            .with("mains_frequency", 0.0)
            .with("inverter_voltage", 230.2)
            .with("output_voltage", 230.0)
            .with("output_frequency", 49.98)
            .with("output_active_power", FieldValue::Integer(133))
            .with("output_apparent_power", FieldValue::Integer(184))
            .with("battery_voltage", 26.5)
            .with("battery_current", -3.2)
            .with("battery_power", FieldValue::Integer(-85))
            .with("pv_voltage", 0.0)
            .with("pv_current", 0.0)
            .with("pv_charge_power", FieldValue::Integer(0))
            .with("load_percent", FieldValue::Integer(3))
            .with("temp_inverter", FieldValue::Integer(39))
            .with("battery_soc", FieldValue::Integer(55))
    }

    #[test]
    fn qpigs_matches_ascii_shape() {
        let d = qpigs(&sensors());
        assert_eq!(d.keys(), QPIGS_FIELDS[..21].to_vec());
        assert_eq!(d.get_str("grid_voltage"), Some("000.0"));
        assert_eq!(d.get_str("ac_output_voltage"), Some("230.0"));
        assert_eq!(d.get_str("ac_output_frequency"), Some("50.0"));
        assert_eq!(d.get_str("output_active_power"), Some("0133"));
        assert_eq!(d.get_str("load_percent"), Some("003"));
        assert_eq!(d.get_str("bus_voltage"), Some("230"));
        assert_eq!(d.get_str("battery_voltage"), Some("26.50"));
        assert_eq!(d.get_str("battery_charging_current"), Some("000"));
        assert_eq!(d.get_str("battery_discharge_current"), Some("00003"));
        assert_eq!(d.get_str("battery_capacity"), Some("055"));
        assert_eq!(d.get_str("inverter_heat_sink_temperature"), Some("0039"));
    }

    #[test]
    fn mimicked_qpigs_reads_like_ascii() {
        let mimic = qpigs(&sensors());
        let text = mimic
            .keys()
            .iter()
            .filter_map(|k| mimic.get_str(k))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(decoder::decode("QPIGS", &text), mimic);
    }

    #[test]
    fn battery_current_split() {
        assert_eq!(split_battery_current(12.0), (12.0, 0.0));
        assert_eq!(split_battery_current(-3.0), (0.0, 3.0));
        assert_eq!(split_battery_current(0.0), (0.0, 0.0));
    }

    #[test]
    fn mode_keywords() {
        assert_eq!(mode_code("Fault"), Some(b'F'));
        assert_eq!(mode_code("Off-Grid"), Some(b'B'));
        assert_eq!(mode_code("Mains"), Some(b'L'));
        assert_eq!(mode_code("Bypass"), Some(b'L'));
        assert_eq!(mode_code("Standby"), Some(b'S'));
        assert_eq!(mode_code("Charging"), Some(b'S'));
        assert_eq!(mode_code("Power On"), Some(b'P'));
        assert_eq!(mode_code("???"), None);

        assert_eq!(qmod(&sensors()), Decoded::new().with("operating_mode", "Battery"));
        let unknown = Decoded::new().with("operation_mode", FieldValue::Integer(42));
        assert_eq!(qmod(&unknown), Decoded::new().with("operating_mode", "Unknown"));
    }

    #[test]
    fn qpiri_enums() {
        let config = Decoded::new()
            .with("output_priority", FieldValue::Integer(2))
            .with("battery_type", FieldValue::Integer(3))
            .with("battery_charging_priority", FieldValue::Integer(9))
            .with("max_charge_voltage", 28.2)
            .with("max_charging_current", 60.0);
        let d = qpiri(&config);
        assert_eq!(d.get_str("output_source_priority"), Some("SBU"));
        assert_eq!(d.get_str("battery_type"), Some("LIB"));
        assert_eq!(d.get_str("charger_source_priority"), Some("9"));
        assert_eq!(d.get_str("bulk_charging_voltage"), Some("28.2"));
        assert_eq!(d.get_str("max_charging_current"), Some("060"));
        assert_eq!(d.get_str("rated_output_active_power"), Some("0000"));
    }

    #[test]
    fn errors_pass_through() {
        let err = Decoded::error("timeout after 10000ms");
        assert_eq!(qpigs(&err), err);
        assert_eq!(qpiri(&err), err);
        assert_eq!(qmod(&err), err);
    }
}
