use serde::Serialize;
use std::fmt;

/// Protocol layer a trace event was emitted from.
///
/// The discriminant is the raw 3-bit header field. A field of 0 decodes to
/// layer -1, which the device tables have no name for; it is kept as
/// [`Layer::Unknown`] rather than dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum Layer {
    Unknown = 0,
    Physical = 1,
    Control = 2,
    Express = 3,
    Data = 4,
    Mgmt = 5,
    Comm = 6,
    Config = 7,
}

impl Layer {
    pub const COUNT: usize = 8;

    /// Layers with a table entry, in column order.
    pub const KNOWN: [Layer; 7] = [
        Layer::Physical,
        Layer::Control,
        Layer::Express,
        Layer::Data,
        Layer::Mgmt,
        Layer::Comm,
        Layer::Config,
    ];

    pub fn from_field(field: u8) -> Self {
        match field & 0x7 {
            1 => Layer::Physical,
            2 => Layer::Control,
            3 => Layer::Express,
            4 => Layer::Data,
            5 => Layer::Mgmt,
            6 => Layer::Comm,
            7 => Layer::Config,
            _ => Layer::Unknown,
        }
    }

    pub fn field(self) -> u8 {
        self as u8
    }

    /// Layer number as the device reports it: field minus one, so -1 for
    /// [`Layer::Unknown`].
    pub fn value(self) -> i8 {
        self as i8 - 1
    }

    /// Column of this layer in the flow view, `None` for [`Layer::Unknown`].
    pub fn column(self) -> Option<usize> {
        match self {
            Layer::Unknown => None,
            layer => Some(layer as usize - 1),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Layer::Unknown => "Unknown",
            Layer::Physical => "Physical",
            Layer::Control => "Control",
            Layer::Express => "Express",
            Layer::Data => "Data",
            Layer::Mgmt => "Mgmt",
            Layer::Comm => "Comm",
            Layer::Config => "Config",
        }
    }

    pub fn full_name(self) -> &'static str {
        match self {
            Layer::Mgmt => "Management",
            Layer::Comm => "Communication",
            Layer::Config => "Configuration",
            layer => layer.name(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        std::iter::once(Layer::Unknown)
            .chain(Layer::KNOWN)
            .find(|layer| {
                layer.name().eq_ignore_ascii_case(name) || layer.full_name().eq_ignore_ascii_case(name)
            })
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Severity of a trace event, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum Level {
    Error = 0,
    Warning = 1,
    Info = 2,
    Verbose = 3,
}

impl Level {
    pub const COUNT: usize = 4;

    pub const ALL: [Level; 4] = [Level::Error, Level::Warning, Level::Info, Level::Verbose];

    pub fn from_field(field: u8) -> Self {
        match field & 0x3 {
            0 => Level::Error,
            1 => Level::Warning,
            2 => Level::Info,
            _ => Level::Verbose,
        }
    }

    pub fn field(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Error => "Error",
            Level::Warning => "Warning",
            Level::Info => "Info",
            Level::Verbose => "Verbose",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Level::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single decoded trace record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Milliseconds since the first entry of the run
    pub time: u64,
    pub index: u64,
    pub event: u16,
    pub layer: Layer,
    pub level: Level,
    /// Uppercase hex pairs separated by single spaces
    pub payload: String,
}

impl LogEntry {
    /// e.g. `1.250`
    pub fn seconds(&self) -> String {
        format!("{}.{:03}", self.time / 1000, self.time % 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_field_zero_is_unknown_with_value_minus_one() {
        let layer = Layer::from_field(0);
        assert_eq!(layer, Layer::Unknown);
        assert_eq!(layer.value(), -1);
        assert_eq!(layer.column(), None);
    }

    #[test]
    fn known_layers_follow_table_order() {
        for (column, layer) in Layer::KNOWN.iter().enumerate() {
            assert_eq!(layer.column(), Some(column));
            assert_eq!(layer.value(), column as i8);
            assert_eq!(Layer::from_field(layer.field()), *layer);
        }
        assert_eq!(Layer::Comm.full_name(), "Communication");
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(Layer::from_name("mgmt"), Some(Layer::Mgmt));
        assert_eq!(Layer::from_name("Management"), Some(Layer::Mgmt));
        assert_eq!(Layer::from_name("unknown"), Some(Layer::Unknown));
        assert_eq!(Layer::from_name("transport"), None);
        assert_eq!(Level::from_name(" VERBOSE "), Some(Level::Verbose));
        assert_eq!(Level::from_name("debug"), None);
    }

    #[test]
    fn seconds_keeps_three_decimals() {
        let entry = LogEntry {
            time: 61_005,
            index: 0,
            event: 0,
            layer: Layer::Data,
            level: Level::Info,
            payload: String::new(),
        };
        assert_eq!(entry.seconds(), "61.005");
        assert_eq!(LogEntry { time: 7, ..entry }.seconds(), "0.007");
    }
}
