use std::fmt;

/// Query commands understood by Voltronic-family inverters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Command {
    Qpigs,
    Qpigs2,
    Qpiri,
    Qmod,
    Qpiws,
    Qvfw,
    Qmchgcr,
    Qmuchgcr,
    Qflag,
    Qsid,
    Qid,
    Qmn,
    Qbeqi,
    Unknown,
}

struct Entry {
    command: Command,
    name: &'static str,
    wire: &'static [u8],
}

// Precomputed `ASCII + CRC16 + CR` packets. The unit tests hold these to the
// output of `codec::encode` so the two can never drift apart.
#[rustfmt::skip]
static TABLE: &[Entry] = &[
    Entry { command: Command::Qpigs,    name: "QPIGS",    wire: &[0x51, 0x50, 0x49, 0x47, 0x53, 0xB7, 0xA9, 0x0D] },
    Entry { command: Command::Qpigs2,   name: "QPIGS2",   wire: &[0x51, 0x50, 0x49, 0x47, 0x53, 0x32, 0x68, 0x2D, 0x0D] },
    Entry { command: Command::Qpiri,    name: "QPIRI",    wire: &[0x51, 0x50, 0x49, 0x52, 0x49, 0xF8, 0x54, 0x0D] },
    Entry { command: Command::Qmod,     name: "QMOD",     wire: &[0x51, 0x4D, 0x4F, 0x44, 0x49, 0xC1, 0x0D] },
    Entry { command: Command::Qpiws,    name: "QPIWS",    wire: &[0x51, 0x50, 0x49, 0x57, 0x53, 0xB4, 0xDA, 0x0D] },
    Entry { command: Command::Qvfw,     name: "QVFW",     wire: &[0x51, 0x56, 0x46, 0x57, 0x62, 0x99, 0x0D] },
    Entry { command: Command::Qmchgcr,  name: "QMCHGCR",  wire: &[0x51, 0x4D, 0x43, 0x48, 0x47, 0x43, 0x52, 0xD8, 0x55, 0x0D] },
    Entry { command: Command::Qmuchgcr, name: "QMUCHGCR", wire: &[0x51, 0x4D, 0x55, 0x43, 0x48, 0x47, 0x43, 0x52, 0x26, 0x34, 0x0D] },
    Entry { command: Command::Qflag,    name: "QFLAG",    wire: &[0x51, 0x46, 0x4C, 0x41, 0x47, 0x98, 0x74, 0x0D] },
    Entry { command: Command::Qsid,     name: "QSID",     wire: &[0x51, 0x53, 0x49, 0x44, 0xBB, 0x05, 0x0D] },
    Entry { command: Command::Qid,      name: "QID",      wire: &[0x51, 0x49, 0x44, 0xD6, 0xEA, 0x0D] },
    Entry { command: Command::Qmn,      name: "QMN",      wire: &[0x51, 0x4D, 0x4E, 0xBB, 0x64, 0x0D] },
    Entry { command: Command::Qbeqi,    name: "QBEQI",    wire: &[0x51, 0x42, 0x45, 0x51, 0x49, 0x2E, 0xA9, 0x0D] },
];

impl Command {
    /// Case-insensitive lookup. Anything not in the table is `Command::Unknown`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        TABLE
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.command)
            .unwrap_or(Command::Unknown)
    }

    /// Reverse lookup from a space separated hex dump such as `"51 4D 4E BB 64 0D"`.
    pub fn from_hex(hex: &str) -> Self {
        let wanted: Option<Vec<u8>> = hex
            .split_whitespace()
            .map(|b| u8::from_str_radix(b, 16).ok())
            .collect();

        match wanted {
            Some(bytes) => TABLE
                .iter()
                .find(|e| e.wire == bytes.as_slice())
                .map(|e| e.command)
                .unwrap_or(Command::Unknown),
            None => Command::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        self.entry().map(|e| e.name).unwrap_or("Unknown command")
    }

    pub fn wire_bytes(&self) -> Option<&'static [u8]> {
        self.entry().map(|e| e.wire)
    }

    pub fn is_known(&self) -> bool {
        *self != Command::Unknown
    }

    pub fn all() -> impl Iterator<Item = Command> {
        TABLE.iter().map(|e| e.command)
    }

    fn entry(&self) -> Option<&'static Entry> {
        TABLE.iter().find(|e| e.command == *self)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voltronic::codec;

    #[test]
    fn table_matches_encoder() {
        for command in Command::all() {
            assert_eq!(
                command.wire_bytes().unwrap(),
                codec::encode(command.name()).as_slice(),
                "{}",
                command
            );
        }
    }

    #[test]
    fn qpigs_wire_bytes() {
        assert_eq!(
            Command::from_name("QPIGS").wire_bytes().unwrap(),
            &[0x51, 0x50, 0x49, 0x47, 0x53, 0xB7, 0xA9, 0x0D]
        );
    }

    #[test]
    fn lookups() {
        assert_eq!(Command::from_name("qpiri"), Command::Qpiri);
        assert_eq!(Command::from_name("QXYZ"), Command::Unknown);
        assert_eq!(Command::Unknown.wire_bytes(), None);
        assert_eq!(Command::from_hex("51 4d 4e bb 64 0d"), Command::Qmn);
        assert_eq!(Command::from_hex("51 4D 4E"), Command::Unknown);
        assert_eq!(Command::from_hex("zz"), Command::Unknown);
    }
}
