use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Display names for single-character setting codes.
pub trait CodeName {
    fn name(&self) -> &'static str;
}

/// Maps a one-character code to its name, or returns the code unchanged when it
/// is not a known member.
pub fn name_for<E>(code: &str) -> String
where
    E: TryFrom<u8> + CodeName,
{
    let code = code.trim();
    if let [b] = code.as_bytes() {
        if let Ok(e) = E::try_from(*b) {
            return e.name().to_string();
        }
    }
    code.to_string()
}

// {{{ BatteryType
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BatteryType {
    Agm = b'0',
    Flooded = b'1',
    UserDefined = b'2',
    Lib = b'3',
    Lic = b'4',
    Reserved = b'5',
    Reserved1 = b'6',
    Reserved2 = b'7',
}

impl CodeName for BatteryType {
    fn name(&self) -> &'static str {
        match self {
            Self::Agm => "AGM",
            Self::Flooded => "Flooded",
            Self::UserDefined => "UserDefined",
            Self::Lib => "LIB",
            Self::Lic => "LIC",
            Self::Reserved => "RESERVED",
            Self::Reserved1 => "RESERVED_1",
            Self::Reserved2 => "RESERVED_2",
        }
    }
}
// }}}

// {{{ AcInputVoltageRange
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AcInputVoltageRange {
    Appliance = b'0',
    Ups = b'1',
}

impl CodeName for AcInputVoltageRange {
    fn name(&self) -> &'static str {
        match self {
            Self::Appliance => "Appliance",
            Self::Ups => "UPS",
        }
    }
}
// }}}

// {{{ OutputSourcePriority
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OutputSourcePriority {
    UtilityFirst = b'0',
    SolarFirst = b'1',
    Sbu = b'2',
    BatteryOnly = b'4',
    UtilityOnly = b'5',
    SolarAndUtility = b'6',
    Smart = b'7',
}

impl CodeName for OutputSourcePriority {
    fn name(&self) -> &'static str {
        match self {
            Self::UtilityFirst => "UtilityFirst",
            Self::SolarFirst => "SolarFirst",
            Self::Sbu => "SBU",
            Self::BatteryOnly => "BatteryOnly",
            Self::UtilityOnly => "UtilityOnly",
            Self::SolarAndUtility => "SolarAndUtility",
            Self::Smart => "Smart",
        }
    }
}
// }}}

// {{{ ChargerSourcePriority
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ChargerSourcePriority {
    UtilityFirst = b'0',
    SolarFirst = b'1',
    SolarAndUtility = b'2',
    OnlySolar = b'3',
}

impl CodeName for ChargerSourcePriority {
    fn name(&self) -> &'static str {
        match self {
            Self::UtilityFirst => "UtilityFirst",
            Self::SolarFirst => "SolarFirst",
            Self::SolarAndUtility => "SolarAndUtility",
            Self::OnlySolar => "OnlySolar",
        }
    }
}
// }}}

// {{{ ParallelMode
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ParallelMode {
    Master = b'0',
    Slave = b'1',
    Standalone = b'2',
}

impl CodeName for ParallelMode {
    fn name(&self) -> &'static str {
        match self {
            Self::Master => "Master",
            Self::Slave => "Slave",
            Self::Standalone => "Standalone",
        }
    }
}
// }}}

// {{{ OperatingMode
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OperatingMode {
    PowerOn = b'P',
    Standby = b'S',
    Line = b'L',
    Battery = b'B',
    ShutdownApproaching = b'D',
    Fault = b'F',
}

impl CodeName for OperatingMode {
    fn name(&self) -> &'static str {
        match self {
            Self::PowerOn => "PowerOn",
            Self::Standby => "Standby",
            Self::Line => "Line",
            Self::Battery => "Battery",
            Self::ShutdownApproaching => "ShutdownApproaching",
            Self::Fault => "Fault",
        }
    }
}
// }}}

// {{{ status bits

/// Normalizes a status bit string: only `0`/`1` are kept, the result is cut or
/// right-padded with `0` to `width`, and character `i` becomes bit `i`.
fn parse_bits(raw: &str, width: usize) -> (String, u16) {
    let mut bits: String = raw.chars().filter(|c| *c == '0' || *c == '1').take(width).collect();
    while bits.len() < width {
        bits.push('0');
    }

    let value = bits
        .chars()
        .enumerate()
        .filter(|(_, c)| *c == '1')
        .fold(0u16, |acc, (i, _)| acc | (1 << i));

    (bits, value)
}

fn bits_string(value: u16, width: usize) -> String {
    (0..width)
        .map(|i| if value & (1 << i) != 0 { '1' } else { '0' })
        .collect()
}

fn is_bit_set(data: u16, bit: u16) -> bool {
    (data & bit) == bit
}

/// The 8-bit `device_status_bits_b7_b0` word from QPIGS.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StatusBitsB7B0 {
    pub fault: bool,
    pub line_fail: bool,
    pub bus_over: bool,
    pub battery_low: bool,
    pub battery_high: bool,
    pub inverter_overload: bool,
    pub inverter_on: bool,
    pub raw: String,
}

impl StatusBitsB7B0 {
    pub const WIDTH: usize = 8;

    const FAULT: u16 = 1 << 7;
    const BUS_OVER: u16 = 1 << 5;
    const LINE_FAIL: u16 = 1 << 4;
    const BATTERY_LOW: u16 = 1 << 3;
    const BATTERY_HIGH: u16 = 1 << 2;
    const INVERTER_OVERLOAD: u16 = 1 << 1;
    const INVERTER_ON: u16 = 1 << 0;

    pub fn new(raw: &str) -> Self {
        let (raw, data) = parse_bits(raw, Self::WIDTH);
        Self {
            fault: is_bit_set(data, Self::FAULT),
            line_fail: is_bit_set(data, Self::LINE_FAIL),
            bus_over: is_bit_set(data, Self::BUS_OVER),
            battery_low: is_bit_set(data, Self::BATTERY_LOW),
            battery_high: is_bit_set(data, Self::BATTERY_HIGH),
            inverter_overload: is_bit_set(data, Self::INVERTER_OVERLOAD),
            inverter_on: is_bit_set(data, Self::INVERTER_ON),
            raw,
        }
    }

    /// Wire form of a word with these flags set.
    pub fn to_bits(&self) -> String {
        let flags = [
            (self.fault, Self::FAULT),
            (self.bus_over, Self::BUS_OVER),
            (self.line_fail, Self::LINE_FAIL),
            (self.battery_low, Self::BATTERY_LOW),
            (self.battery_high, Self::BATTERY_HIGH),
            (self.inverter_overload, Self::INVERTER_OVERLOAD),
            (self.inverter_on, Self::INVERTER_ON),
        ];
        let value = flags
            .iter()
            .filter(|(set, _)| *set)
            .fold(0, |acc, (_, bit)| acc | bit);
        bits_string(value, Self::WIDTH)
    }

    pub fn fields(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("fault", self.fault),
            ("line_fail", self.line_fail),
            ("bus_over", self.bus_over),
            ("battery_low", self.battery_low),
            ("battery_high", self.battery_high),
            ("inverter_overload", self.inverter_overload),
            ("inverter_on", self.inverter_on),
        ]
    }
}

/// The 3-bit `device_status_bits_b10_b8` word from QPIGS.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StatusBitsB10B8 {
    pub charging_to_battery: bool,
    pub charging_ac_active: bool,
    pub charging_scc_active: bool,
    pub raw: String,
}

impl StatusBitsB10B8 {
    pub const WIDTH: usize = 3;

    const CHARGING_TO_BATTERY: u16 = 1 << 2;
    const CHARGING_AC_ACTIVE: u16 = 1 << 1;
    const CHARGING_SCC_ACTIVE: u16 = 1 << 0;

    pub fn new(raw: &str) -> Self {
        let (raw, data) = parse_bits(raw, Self::WIDTH);
        Self {
            charging_to_battery: is_bit_set(data, Self::CHARGING_TO_BATTERY),
            charging_ac_active: is_bit_set(data, Self::CHARGING_AC_ACTIVE),
            charging_scc_active: is_bit_set(data, Self::CHARGING_SCC_ACTIVE),
            raw,
        }
    }

    pub fn to_bits(&self) -> String {
        let mut value = 0;
        if self.charging_to_battery {
            value |= Self::CHARGING_TO_BATTERY;
        }
        if self.charging_ac_active {
            value |= Self::CHARGING_AC_ACTIVE;
        }
        if self.charging_scc_active {
            value |= Self::CHARGING_SCC_ACTIVE;
        }
        bits_string(value, Self::WIDTH)
    }

    pub fn fields(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("charging_to_battery", self.charging_to_battery),
            ("charging_ac_active", self.charging_ac_active),
            ("charging_scc_active", self.charging_scc_active),
        ]
    }
}
// }}}
