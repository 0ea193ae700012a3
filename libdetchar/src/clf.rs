//! Reading and writing of Channel List Files (CLF).
//!
//! A CLF is an INI file with one section per channel group:
//!
//! ```text
//! [GW]
//! flow = 10
//! fhigh = Nyquist
//! qhigh = 100
//! frametype = H1_HOFT_C00
//! channels =
//!     H1:GDS-CALIB_STRAIN 16384 unsafe clean
//!     L1:GDS-CALIB_STRAIN 16384
//! ```
//!
//! Each line of `channels` is `NAME [RATE [SAFETY [FIDELITY]]]`. `flow` and `fhigh`
//! set the frequency range of every channel in the section, `fhigh = Nyquist` meaning
//! half the channel's sample rate. `frametype` is kept on the channel, anything else
//! lands in its params.
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use super::channel::{format_number, parse_number, Channel, ChannelList, ParamValue};
use super::error::ChannelListError;

const NYQUIST: &str = "Nyquist";

struct Entry {
    line: usize,
    lines: Vec<(usize, String)>,
}

struct Section {
    name: String,
    keys: Vec<(String, Entry)>,
}

fn split_key(line: &str) -> Option<(&str, &str)> {
    line.split_once('=')
        .or_else(|| line.split_once(':'))
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
}

fn parse_sections(text: &str) -> Result<Vec<Section>, ChannelListError> {
    let mut sections: Vec<Section> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        let indented = raw.starts_with(char::is_whitespace);

        if !indented && trimmed.starts_with('[') {
            let name = trimmed
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .ok_or_else(|| ChannelListError::BadLine(lineno, raw.to_string()))?;
            sections.push(Section {
                name: name.trim().to_string(),
                keys: Vec::new(),
            });
            continue;
        }

        let section = sections
            .last_mut()
            .ok_or(ChannelListError::NoSection(lineno))?;
        if indented {
            match section.keys.last_mut() {
                Some((_, entry)) => entry.lines.push((lineno, trimmed.to_string())),
                None => return Err(ChannelListError::BadLine(lineno, raw.to_string())),
            }
            continue;
        }

        let (key, value) =
            split_key(trimmed).ok_or_else(|| ChannelListError::BadLine(lineno, raw.to_string()))?;
        let mut entry = Entry {
            line: lineno,
            lines: Vec::new(),
        };
        if !value.is_empty() {
            entry.lines.push((lineno, value.to_string()));
        }
        section.keys.push((key.to_lowercase(), entry));
    }
    Ok(sections)
}

fn single_value(entry: &Entry) -> String {
    entry
        .lines
        .iter()
        .map(|(_, l)| l.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_channel_line(
    lineno: usize,
    line: &str,
    group: &str,
) -> Result<Channel, ChannelListError> {
    let mut fields = line.split_whitespace();
    let name = fields
        .next()
        .ok_or_else(|| ChannelListError::BadLine(lineno, line.to_string()))?;
    let mut channel = Channel::new(name);
    channel.group = Some(group.to_string());
    if let Some(rate) = fields.next() {
        channel.sample_rate = Some(
            parse_number(rate).ok_or_else(|| ChannelListError::BadLine(lineno, line.to_string()))?,
        );
    }
    if let Some(safety) = fields.next() {
        channel.safe = match safety.to_lowercase().as_str() {
            "safe" => Some(true),
            "unsafe" => Some(false),
            _ => None,
        };
    }
    channel.fidelity = fields.next().map(String::from);
    Ok(channel)
}

/// Parse the contents of a channel list file
pub fn parse_channel_list(text: &str) -> Result<ChannelList, ChannelListError> {
    let mut list = ChannelList::new();
    for section in parse_sections(text)? {
        let mut flow: Option<f64> = None;
        let mut fhigh: Option<(usize, String)> = None;
        let mut frametype: Option<String> = None;
        let mut params: BTreeMap<String, ParamValue> = BTreeMap::new();
        let mut channels: Vec<Channel> = Vec::new();

        for (key, entry) in &section.keys {
            match key.as_str() {
                "channels" => {
                    for (lineno, line) in &entry.lines {
                        channels.push(parse_channel_line(*lineno, line, &section.name)?);
                    }
                }
                "flow" => {
                    let value = single_value(entry);
                    flow = Some(
                        parse_number(&value)
                            .ok_or_else(|| ChannelListError::BadLine(entry.line, value))?,
                    );
                }
                "fhigh" => fhigh = Some((entry.line, single_value(entry))),
                "frametype" => frametype = Some(single_value(entry)),
                _ => {
                    params.insert(key.clone(), ParamValue::parse(&single_value(entry)));
                }
            }
        }

        for mut channel in channels {
            let high = match &fhigh {
                None => None,
                Some((_, v)) if v.eq_ignore_ascii_case(NYQUIST) => {
                    Some(channel.sample_rate.map_or(f64::INFINITY, |r| r / 2.0))
                }
                Some((line, v)) => Some(
                    parse_number(v).ok_or_else(|| ChannelListError::BadLine(*line, v.clone()))?,
                ),
            };
            if flow.is_some() || high.is_some() {
                channel.frequency_range =
                    Some((flow.unwrap_or(0.0), high.unwrap_or(f64::INFINITY)));
            }
            channel.frametype = frametype.clone();
            channel.params = params.clone();
            list.push(channel);
        }
    }
    log::debug!("Parsed {} channels from channel list", list.len());
    Ok(list)
}

/// Read a channel list file from disk
pub fn read_channel_list_file(path: &Path) -> Result<ChannelList, ChannelListError> {
    let text = std::fs::read_to_string(path)?;
    parse_channel_list(&text)
}

fn channel_line(channel: &Channel) -> String {
    let mut line = channel.name.clone();
    let Some(rate) = channel.sample_rate else {
        return line;
    };
    line.push_str(&format!(" {}", format_number(rate)));
    if channel.safe.is_none() && channel.fidelity.is_none() {
        return line;
    }
    let safety = match channel.safe {
        Some(true) => "safe",
        Some(false) => "unsafe",
        None => "unknown",
    };
    line.push_str(&format!(" {safety}"));
    if let Some(fidelity) = &channel.fidelity {
        line.push_str(&format!(" {fidelity}"));
    }
    line
}

/// Write channels in CLF format, one section per group.
///
/// Section-wide values (`flow`, `fhigh`, `frametype`, params) are taken from the first
/// channel of each group. Channels with no group are written under `[channels]`.
pub fn write_channel_list<W: Write>(
    list: &ChannelList,
    writer: &mut W,
) -> Result<(), ChannelListError> {
    let mut groups: Vec<(&str, Vec<&Channel>)> = Vec::new();
    for channel in list.iter() {
        let group = channel.group.as_deref().unwrap_or("channels");
        match groups.iter_mut().find(|(name, _)| *name == group) {
            Some((_, members)) => members.push(channel),
            None => groups.push((group, vec![channel])),
        }
    }

    for (index, (group, members)) in groups.iter().enumerate() {
        if index > 0 {
            writeln!(writer)?;
        }
        writeln!(writer, "[{group}]")?;
        let first = members[0];
        if let Some((low, high)) = first.frequency_range {
            writeln!(writer, "flow = {}", format_number(low))?;
            let nyquist = members.iter().all(|c| match (c.frequency_range, c.sample_rate) {
                (Some((_, h)), Some(rate)) => h == rate / 2.0,
                _ => false,
            });
            if nyquist {
                writeln!(writer, "fhigh = {NYQUIST}")?;
            } else {
                writeln!(writer, "fhigh = {}", format_number(high))?;
            }
        }
        for (key, value) in &first.params {
            writeln!(writer, "{key} = {value}")?;
        }
        if let Some(frametype) = &first.frametype {
            writeln!(writer, "frametype = {frametype}")?;
        }
        writeln!(writer, "channels =")?;
        for channel in members {
            writeln!(writer, "    {}", channel_line(channel))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# test channel list
[GW]
flow = 10
fhigh = Nyquist
qhigh = 100
frametype = H1_HOFT_C00
channels =
    H1:GDS-CALIB_STRAIN 16384 unsafe clean
    H1:GDS-CALIB_STRAIN_NOLINES 4096

[PEM]
flow: 0.5
fhigh = 64
channels =
\tH1:PEM-CS_MAG_LVEA_VERTEX_X_DQ 512 safe glitchy
\tH1:PEM-EY_SEIS_VEA_FLOOR_X_DQ
";

    #[test]
    fn test_parse_sample() {
        let list = parse_channel_list(SAMPLE).unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list.groups(), vec!["GW", "PEM"]);

        let strain = list.find("H1:GDS-CALIB_STRAIN").unwrap();
        assert_eq!(strain.sample_rate, Some(16384.0));
        assert_eq!(strain.safe, Some(false));
        assert_eq!(strain.fidelity.as_deref(), Some("clean"));
        assert_eq!(strain.frequency_range, Some((10.0, 8192.0)));
        assert_eq!(strain.frametype.as_deref(), Some("H1_HOFT_C00"));
        assert_eq!(strain.params.get("qhigh"), Some(&ParamValue::Number(100.0)));

        let nolines = list.find("H1:GDS-CALIB_STRAIN_NOLINES").unwrap();
        assert_eq!(nolines.frequency_range, Some((10.0, 2048.0)));
        assert_eq!(nolines.safe, None);

        let mag = list.find("H1:PEM-CS_MAG_LVEA_VERTEX_X_DQ").unwrap();
        assert_eq!(mag.safe, Some(true));
        assert_eq!(mag.frequency_range, Some((0.5, 64.0)));
        assert_eq!(mag.group.as_deref(), Some("PEM"));

        let seis = list.find("H1:PEM-EY_SEIS_VEA_FLOOR_X_DQ").unwrap();
        assert_eq!(seis.sample_rate, None);
    }

    #[test]
    fn test_write_then_parse() {
        let list = parse_channel_list(SAMPLE).unwrap();
        let mut buffer: Vec<u8> = Vec::new();
        write_channel_list(&list, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("fhigh = Nyquist"));
        let reparsed = parse_channel_list(&text).unwrap();
        assert_eq!(reparsed, list);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_channel_list("channels =\n    H1:FOO 16\n"),
            Err(ChannelListError::NoSection(1))
        ));
        assert!(matches!(
            parse_channel_list("[GW]\nchannels =\n    H1:FOO fast\n"),
            Err(ChannelListError::BadLine(3, _))
        ));
        assert!(matches!(
            parse_channel_list("[GW]\nnot a key value pair\n"),
            Err(ChannelListError::BadLine(2, _))
        ));
        assert!(parse_channel_list("").unwrap().is_empty());
    }

    #[test]
    fn test_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.ini");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(read_channel_list_file(&path).unwrap().len(), 4);
        assert!(matches!(
            read_channel_list_file(&dir.path().join("missing.ini")),
            Err(ChannelListError::IOError(_))
        ));
    }
}
