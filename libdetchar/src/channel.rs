use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::units::Unit;

/// Sample type of a channel as recorded by the DAQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Complex64,
    Uint32,
}

impl DataType {
    /// Map a LIGO DAQ data type code (1 through 7)
    pub fn from_daq_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Int16),
            2 => Some(Self::Int32),
            3 => Some(Self::Int64),
            4 => Some(Self::Float32),
            5 => Some(Self::Float64),
            6 => Some(Self::Complex64),
            7 => Some(Self::Uint32),
            _ => None,
        }
    }

    pub fn daq_code(&self) -> i64 {
        match self {
            Self::Int16 => 1,
            Self::Int32 => 2,
            Self::Int64 => 3,
            Self::Float32 => 4,
            Self::Float64 => 5,
            Self::Complex64 => 6,
            Self::Uint32 => 7,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Uint32 => "uint32",
        };
        write!(f, "{name}")
    }
}

/// Free-form channel parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Vector(Vec<f64>),
    Text(String),
}

impl ParamValue {
    /// Numbers (including `Inf`) become `Number`, anything else is kept as `Text`
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match parse_number(raw) {
            Some(x) => Self::Number(x),
            None => Self::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(x) => Some(*x),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(x) => write!(f, "{}", format_number(*x)),
            Self::Vector(v) => {
                let items: Vec<String> = v.iter().map(|x| format_number(*x)).collect();
                write!(f, "[{}]", items.join(" "))
            }
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Parse a float, accepting `Inf`/`-Inf` spelled any way
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    match raw.to_lowercase().as_str() {
        "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        "nan" => None,
        lower => lower.parse().ok(),
    }
}

pub(crate) fn format_number(x: f64) -> String {
    if x == f64::INFINITY {
        String::from("Inf")
    } else if x == f64::NEG_INFINITY {
        String::from("-Inf")
    } else {
        format!("{x}")
    }
}

/// A named data channel and whatever metadata is known about it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub sample_rate: Option<f64>,
    pub unit: Option<Unit>,
    pub frequency_range: Option<(f64, f64)>,
    pub safe: Option<bool>,
    pub fidelity: Option<String>,
    pub frametype: Option<String>,
    pub model: Option<String>,
    pub url: Option<String>,
    pub dtype: Option<DataType>,
    pub group: Option<String>,
    pub params: BTreeMap<String, ParamValue>,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Interferometer prefix, e.g. `H1` for `H1:GDS-CALIB_STRAIN`
    pub fn ifo(&self) -> Option<&str> {
        self.name.split_once(':').map(|(ifo, _)| ifo)
    }

    /// Subsystem, e.g. `GDS` for `H1:GDS-CALIB_STRAIN`
    pub fn system(&self) -> Option<&str> {
        let (_, rest) = self.name.split_once(':')?;
        rest.split(&['-', '_'][..]).next().filter(|s| !s.is_empty())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An ordered list of channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelList {
    channels: Vec<Channel>,
}

impl ChannelList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, channel: Channel) {
        self.channels.push(channel);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    /// First channel with exactly this name
    pub fn find(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    /// Distinct groups, in order of first appearance
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for group in self.channels.iter().filter_map(|c| c.group.as_deref()) {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    }
}

impl Extend<Channel> for ChannelList {
    fn extend<T: IntoIterator<Item = Channel>>(&mut self, iter: T) {
        self.channels.extend(iter);
    }
}

impl FromIterator<Channel> for ChannelList {
    fn from_iter<T: IntoIterator<Item = Channel>>(iter: T) -> Self {
        Self {
            channels: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ChannelList {
    type Item = Channel;
    type IntoIter = std::vec::IntoIter<Channel>;
    fn into_iter(self) -> Self::IntoIter {
        self.channels.into_iter()
    }
}
