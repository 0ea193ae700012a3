//! Queries against the Channel Information System (CIS) web API.
use serde::Deserialize;

use super::channel::{Channel, ChannelList, DataType};
use super::error::CisError;
use super::units::Unit;

pub const DEFAULT_CIS_URL: &str = "https://cis.ligo.org/api";

#[derive(Debug, Deserialize)]
struct CisPage {
    next: Option<String>,
    #[serde(default)]
    results: Vec<CisRecord>,
}

#[derive(Debug, Deserialize)]
struct CisRecord {
    name: String,
    datarate: Option<f64>,
    units: Option<String>,
    datatype: Option<i64>,
    source: Option<String>,
    displayurl: Option<String>,
}

impl From<CisRecord> for Channel {
    fn from(record: CisRecord) -> Self {
        let mut channel = Channel::new(&record.name);
        channel.sample_rate = record.datarate;
        channel.unit = record.units.as_deref().and_then(|u| u.parse::<Unit>().ok());
        channel.dtype = record.datatype.and_then(DataType::from_daq_code);
        channel.model = record.source.filter(|s| !s.is_empty());
        channel.url = record.displayurl.filter(|s| !s.is_empty());
        channel
    }
}

/// Parse one page of a CIS channel query. Returns the channels and the URL of the
/// next page, if there is one.
pub fn parse_page(json: &str) -> Result<(ChannelList, Option<String>), CisError> {
    let page: CisPage = serde_json::from_str(json)?;
    let channels = page.results.into_iter().map(Channel::from).collect();
    Ok((channels, page.next.filter(|n| !n.is_empty())))
}

/// Blocking CIS client
#[derive(Debug, Clone)]
pub struct CisClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl CisClient {
    pub fn new(base_url: &str) -> Result<Self, CisError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::builder().build()?,
        })
    }

    fn get_page(&self, request: reqwest::blocking::RequestBuilder) -> Result<String, CisError> {
        let response = request.send()?.error_for_status()?;
        Ok(response.text()?)
    }

    /// All channels matching `name`, following pagination until exhausted
    pub fn query(&self, name: &str) -> Result<ChannelList, CisError> {
        let first = self
            .client
            .get(format!("{}/channel/", self.base_url))
            .query(&[("q", name)]);
        let (mut channels, mut next) = parse_page(&self.get_page(first)?)?;
        let mut pages = 1;
        while let Some(url) = next {
            let (more, following) = parse_page(&self.get_page(self.client.get(url))?)?;
            channels.extend(more);
            next = following;
            pages += 1;
        }
        log::info!(
            "CIS query for {name} returned {} channels in {pages} pages",
            channels.len()
        );
        Ok(channels)
    }

    /// The channel named exactly `name`
    pub fn query_channel(&self, name: &str) -> Result<Channel, CisError> {
        self.query(name)?
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| CisError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "count": 2,
        "next": "https://cis.ligo.org/api/channel/?page=2&q=H1%3AGDS",
        "previous": null,
        "results": [
            {
                "id": 1,
                "name": "H1:GDS-CALIB_STRAIN",
                "ifo": "H1",
                "datarate": 16384,
                "units": "strain",
                "datatype": 4,
                "source": "h1calcs",
                "displayurl": "https://cis.ligo.org/channel/1"
            },
            {
                "id": 2,
                "name": "H1:GDS-CALIB_KAPPA_C",
                "datarate": 16.0,
                "units": "",
                "datatype": 5,
                "source": "",
                "displayurl": null
            }
        ]
    }"#;

    #[test]
    fn test_parse_page() {
        let (channels, next) = parse_page(PAGE).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(
            next.as_deref(),
            Some("https://cis.ligo.org/api/channel/?page=2&q=H1%3AGDS")
        );

        let strain = channels.find("H1:GDS-CALIB_STRAIN").unwrap();
        assert_eq!(strain.sample_rate, Some(16384.0));
        assert_eq!(strain.dtype, Some(DataType::Float32));
        assert_eq!(strain.unit.as_ref().map(|u| u.to_string()).as_deref(), Some("strain"));
        assert_eq!(strain.model.as_deref(), Some("h1calcs"));
        assert_eq!(strain.url.as_deref(), Some("https://cis.ligo.org/channel/1"));

        let kappa = channels.find("H1:GDS-CALIB_KAPPA_C").unwrap();
        assert_eq!(kappa.dtype, Some(DataType::Float64));
        assert_eq!(kappa.unit, None);
        assert_eq!(kappa.model, None);
        assert_eq!(kappa.url, None);
    }

    #[test]
    fn test_last_page() {
        let (channels, next) =
            parse_page(r#"{"count": 0, "next": null, "results": []}"#).unwrap();
        assert!(channels.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn test_client_construction() {
        let client = CisClient::new(&format!("{DEFAULT_CIS_URL}/")).unwrap();
        assert_eq!(client.base_url, DEFAULT_CIS_URL);
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            parse_page("<html>not json</html>"),
            Err(CisError::ParsingError(_))
        ));
    }
}
