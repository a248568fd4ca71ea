// Kiwi Warmer Exporter - Thermostat metrics exporter for Prometheus
//
// Copyright 2026 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hyper::client::HttpConnector;
use hyper::{Body, Client, StatusCode, Uri};
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{self, Formatter};
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{event, Level};

const DEVICE_INFO_PATH: &str = "/deviceInfo";

/// Status document reported by the unit.
///
/// The firmware sends every value as a string, numbers included. Fields missing from
/// the document, or sent as `null`, are left empty rather than failing the decode. Only
/// a handful of these are turned into metrics, the rest are kept so that the document
/// can be re-encoded as it was received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(deserialize_with = "nullable")]
    pub result: String,
    /// MAC address of the unit
    #[serde(deserialize_with = "nullable")]
    pub device_id: String,
    #[serde(deserialize_with = "nullable")]
    pub device_name: String,
    #[serde(deserialize_with = "nullable")]
    pub default_temperature: String,
    /// Hundredths of a degree celsius
    #[serde(deserialize_with = "nullable")]
    pub current_temperature: String,
    /// Hundredths of a percent
    #[serde(deserialize_with = "nullable")]
    pub current_humidity: String,
    #[serde(deserialize_with = "nullable")]
    pub original_temperature: String,
    #[serde(deserialize_with = "nullable")]
    pub current_temperature2: String,
    #[serde(deserialize_with = "nullable")]
    pub current_humidity2: String,
    #[serde(deserialize_with = "nullable")]
    pub original_temperature2: String,
    #[serde(deserialize_with = "nullable")]
    pub is_heating: String,
    #[serde(deserialize_with = "nullable")]
    pub time_slot_temperatures: String,
    #[serde(deserialize_with = "nullable")]
    pub work_temperature: String,
    #[serde(deserialize_with = "nullable")]
    pub next_slot_temperature: String,
    #[serde(deserialize_with = "nullable")]
    pub lat: String,
    #[serde(deserialize_with = "nullable")]
    pub lon: String,
    #[serde(deserialize_with = "nullable")]
    pub hw: String,
    #[serde(deserialize_with = "nullable")]
    pub sw: String,
    #[serde(deserialize_with = "nullable")]
    pub error: String,
    #[serde(deserialize_with = "nullable")]
    pub heap_health: String,
    #[serde(deserialize_with = "nullable")]
    pub device_status: String,
}

impl DeviceInfo {
    /// Decode a response body from the unit: base64 (standard alphabet, padded)
    /// wrapping a JSON object.
    ///
    /// Line breaks anywhere in the base64 text are ignored, any other whitespace is an error.
    pub fn from_body(body: &[u8]) -> Result<Self, ClientError> {
        let text = strip_line_breaks(body);
        let decoded = STANDARD
            .decode(&text)
            .map_err(|e| ClientError::Encoding(String::from_utf8_lossy(body).into_owned(), e))?;

        serde_json::from_slice(&decoded).map_err(|e| {
            ClientError::KindMsgCause(ClientErrorKind::Decode, "unable to parse device info", Box::new(e))
        })
    }
}

fn strip_line_breaks(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().copied().filter(|b| *b != b'\r' && *b != b'\n').collect()
}

fn nullable<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum ClientErrorKind {
    Transport,
    BadStatus,
    Read,
    Encoding,
    Decode,
}

impl ClientErrorKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientErrorKind::Transport => "transport",
            ClientErrorKind::BadStatus => "status",
            ClientErrorKind::Read => "read",
            ClientErrorKind::Encoding => "encoding",
            ClientErrorKind::Decode => "decode",
        }
    }
}

#[derive(Debug)]
pub enum ClientError {
    Timeout(Duration),
    BadStatus(StatusCode),
    Encoding(String, base64::DecodeError),
    KindMsg(ClientErrorKind, &'static str),
    KindMsgCause(ClientErrorKind, &'static str, Box<dyn Error + Send + Sync>),
}

impl ClientError {
    pub fn kind(&self) -> ClientErrorKind {
        match self {
            ClientError::Timeout(_) => ClientErrorKind::Transport,
            ClientError::BadStatus(_) => ClientErrorKind::BadStatus,
            ClientError::Encoding(_, _) => ClientErrorKind::Encoding,
            ClientError::KindMsg(kind, _) => *kind,
            ClientError::KindMsgCause(kind, _, _) => *kind,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Timeout(timeout) => write!(f, "request to unit timed out after {:?}", timeout),
            ClientError::BadStatus(status) => write!(f, "unexpected status from unit: {}", status),
            ClientError::Encoding(_, ref e) => write!(f, "unable to decode base64 body: {}", e),
            ClientError::KindMsg(_, msg) => msg.fmt(f),
            ClientError::KindMsgCause(_, msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientError::Encoding(_, ref e) => Some(e),
            ClientError::KindMsgCause(_, _, ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Result of a single request to the unit along with how long it took.
///
/// The duration is measured whether the request succeeded or not.
#[derive(Debug)]
pub struct Scrape {
    pub result: Result<DeviceInfo, ClientError>,
    pub duration: Duration,
}

impl Scrape {
    pub fn seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// HTTP client for the `/deviceInfo` endpoint of a single unit.
///
/// Connections are not kept around between requests, each fetch makes a new one.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    client: Client<HttpConnector, Body>,
    address: String,
    url: String,
    timeout: Duration,
}

impl DeviceClient {
    /// Create a new client for the unit at `address` (`host:port`). `timeout` applies
    /// to each entire request, from connecting until the body has been read.
    pub fn new<S>(address: S, timeout: Duration) -> Self
    where
        S: Into<String>,
    {
        let address = address.into();
        let url = format!("http://{}{}", address, DEVICE_INFO_PATH);
        let client = Client::builder().pool_max_idle_per_host(0).build_http();

        Self {
            client,
            address,
            url,
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Make a single request to the unit and decode the response. Failures are logged
    /// here, once each, and returned as part of the `Scrape`. No retries are attempted.
    pub async fn fetch(&self) -> Scrape {
        let start = Instant::now();
        let result = self.device_info(start + self.timeout).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                event!(
                    Level::DEBUG,
                    message = "fetched device info",
                    url = %self.url,
                    elapsed_secs = duration.as_secs_f64(),
                );
            }
            Err(ClientError::BadStatus(status)) => {
                event!(
                    Level::ERROR,
                    message = "error querying unit",
                    url = %self.url,
                    status = status.as_u16(),
                );
            }
            Err(ClientError::Encoding(body, e)) => {
                event!(
                    Level::ERROR,
                    message = "error decoding base64 response",
                    url = %self.url,
                    error = %e,
                    body = %body,
                );
            }
            Err(e) => {
                event!(
                    Level::ERROR,
                    message = "error querying unit",
                    url = %self.url,
                    kind = e.kind().as_label(),
                    error = %e,
                );
            }
        }

        Scrape { result, duration }
    }

    async fn device_info(&self, deadline: Instant) -> Result<DeviceInfo, ClientError> {
        if self.address.is_empty() {
            return Err(ClientError::KindMsg(
                ClientErrorKind::Transport,
                "no unit address configured",
            ));
        }

        let uri: Uri = self.url.parse().map_err(|e| {
            ClientError::KindMsgCause(ClientErrorKind::Transport, "invalid unit address", Box::new(e))
        })?;

        let res = time::timeout_at(deadline, self.client.get(uri))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
            .map_err(|e| ClientError::KindMsgCause(ClientErrorKind::Transport, "unable to reach unit", Box::new(e)))?;

        if res.status() != StatusCode::OK {
            return Err(ClientError::BadStatus(res.status()));
        }

        let body = time::timeout_at(deadline, hyper::body::to_bytes(res.into_body()))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
            .map_err(|e| ClientError::KindMsgCause(ClientErrorKind::Read, "unable to read response body", Box::new(e)))?;

        DeviceInfo::from_body(&body)
    }
}
