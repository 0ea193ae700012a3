//! Reading and writing of Omega scan configuration files.
//!
//! A configuration is a sequence of `[group,label]` context headers, each followed by
//! any number of `{ ... }` blocks of `key: value` lines describing one channel:
//!
//! ```text
//! [GW,Gravitational wave strain]
//!
//! {
//!   channelName:                 'H1:GDS-CALIB_STRAIN'
//!   frameType:                   'H1_HOFT_C00'
//!   sampleFrequency:             4096
//!   searchFrequencyRange:        [0 Inf]
//!   searchQRange:                [4 64]
//! }
//! ```
use std::io::Write;
use std::path::Path;

use super::channel::{parse_number, Channel, ChannelList, ParamValue};
use super::error::ScanConfigError;

const NAME_KEY: &str = "channelName";
const FRAME_KEY: &str = "frameType";
const RATE_KEY: &str = "sampleFrequency";
const RANGE_KEY: &str = "searchFrequencyRange";

/// One `{ ... }` block of a scan configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanBlock {
    pub group: Option<String>,
    pub label: Option<String>,
    /// Line of the opening brace, or 0 for blocks not read from a file
    pub line: usize,
    pub params: Vec<(String, ParamValue)>,
}

impl ScanBlock {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Convert to a [Channel]. Well-known keys fill the matching fields, the rest are
    /// kept as params.
    pub fn to_channel(&self) -> Result<Channel, ScanConfigError> {
        let name = match self.get(NAME_KEY) {
            Some(ParamValue::Text(name)) => name,
            _ => return Err(ScanConfigError::NoChannelName(self.line)),
        };
        let mut channel = Channel::new(name);
        channel.group = self.group.clone();
        for (key, value) in &self.params {
            match (key.as_str(), value) {
                (NAME_KEY, _) => {}
                (FRAME_KEY, ParamValue::Text(frametype)) => {
                    channel.frametype = Some(frametype.clone())
                }
                (RATE_KEY, ParamValue::Number(rate)) => channel.sample_rate = Some(*rate),
                (RANGE_KEY, ParamValue::Vector(range)) if range.len() == 2 => {
                    channel.frequency_range = Some((range[0], range[1]))
                }
                _ => {
                    channel.params.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(channel)
    }

    /// Inverse of [ScanBlock::to_channel]
    pub fn from_channel(channel: &Channel) -> Self {
        let mut params = vec![(NAME_KEY.to_string(), ParamValue::Text(channel.name.clone()))];
        if let Some(frametype) = &channel.frametype {
            params.push((FRAME_KEY.to_string(), ParamValue::Text(frametype.clone())));
        }
        if let Some(rate) = channel.sample_rate {
            params.push((RATE_KEY.to_string(), ParamValue::Number(rate)));
        }
        if let Some((low, high)) = channel.frequency_range {
            params.push((RANGE_KEY.to_string(), ParamValue::Vector(vec![low, high])));
        }
        params.extend(channel.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            group: channel.group.clone(),
            label: channel.group.clone(),
            line: 0,
            params,
        }
    }
}

/// An ordered Omega scan configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanConfig {
    pub blocks: Vec<ScanBlock>,
}

impl ScanConfig {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn to_channel_list(&self) -> Result<ChannelList, ScanConfigError> {
        self.blocks.iter().map(|b| b.to_channel()).collect()
    }

    pub fn from_channel_list(list: &ChannelList) -> Self {
        Self {
            blocks: list.iter().map(ScanBlock::from_channel).collect(),
        }
    }
}

fn parse_value(lineno: usize, raw: &str) -> Result<ParamValue, ScanConfigError> {
    let raw = raw.trim();
    if let Some(text) = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
    {
        return Ok(ParamValue::Text(text.to_string()));
    }
    if let Some(items) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let values = items
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| parse_number(s).ok_or_else(|| ScanConfigError::BadLine(lineno, raw.to_string())))
            .collect::<Result<Vec<f64>, _>>()?;
        return Ok(ParamValue::Vector(values));
    }
    Ok(ParamValue::parse(raw))
}

/// Parse the contents of an Omega scan configuration
pub fn parse_scan_config(text: &str) -> Result<ScanConfig, ScanConfigError> {
    let mut config = ScanConfig::default();
    let mut group: Option<String> = None;
    let mut label: Option<String> = None;
    let mut open: Option<ScanBlock> = None;

    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            continue;
        }
        if line == "{" && open.is_none() {
            open = Some(ScanBlock {
                group: group.clone(),
                label: label.clone(),
                line: lineno,
                params: Vec::new(),
            });
            continue;
        }
        if line == "}" {
            if let Some(block) = open.take() {
                config.blocks.push(block);
                continue;
            }
        }
        if let Some(block) = open.as_mut() {
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| ScanConfigError::BadLine(lineno, raw.to_string()))?;
            block
                .params
                .push((key.trim().to_string(), parse_value(lineno, value)?));
            continue;
        }
        let header = line
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| ScanConfigError::BadLine(lineno, raw.to_string()))?;
        let (g, l) = header.split_once(',').unwrap_or((header, header));
        group = Some(g.trim().to_string());
        label = Some(l.trim().to_string());
    }
    if let Some(block) = open {
        return Err(ScanConfigError::UnclosedBlock(block.line));
    }
    log::debug!("Parsed {} blocks from scan configuration", config.len());
    Ok(config)
}

pub fn read_scan_config(path: &Path) -> Result<ScanConfig, ScanConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_scan_config(&text)
}

/// Write a scan configuration. A context header is written whenever the group or label
/// changes from one block to the next.
pub fn write_scan_config<W: Write>(
    config: &ScanConfig,
    writer: &mut W,
) -> Result<(), ScanConfigError> {
    let mut context: Option<(Option<&str>, Option<&str>)> = None;
    for block in &config.blocks {
        let this = (block.group.as_deref(), block.label.as_deref());
        if context != Some(this) {
            if let (Some(group), label) = this {
                writeln!(writer, "[{},{}]", group, label.unwrap_or(group))?;
                writeln!(writer)?;
            }
            context = Some(this);
        }
        writeln!(writer, "{{")?;
        for (key, value) in &block.params {
            let value = match value {
                ParamValue::Text(text) => format!("'{text}'"),
                other => other.to_string(),
            };
            writeln!(writer, "  {:<29}{}", format!("{key}:"), value)?;
        }
        writeln!(writer, "}}")?;
        writeln!(writer)?;
    }
    Ok(())
}
