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

use std::error::Error;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::Level;

#[derive(Debug)]
pub enum ConfigError {
    Msg(&'static str, String),
    MsgCause(&'static str, String, Box<dyn Error + Send + Sync>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Msg(msg, value) => write!(f, "{}: {:?}", msg, value),
            ConfigError::MsgCause(msg, value, ref e) => write!(f, "{}: {:?}: {}", msg, value, e),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::MsgCause(_, _, ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Map a log level name to a `Level`. Unrecognized names are treated as `info`.
pub fn log_level(s: &str) -> Level {
    match s.trim().to_ascii_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warning" | "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Parse an address to listen on: `ip:port`, `host:port`, or `:port` for all interfaces.
pub fn listen_address(s: &str) -> Result<SocketAddr, ConfigError> {
    let s = s.trim();
    let candidate = if s.starts_with(':') {
        format!("0.0.0.0{}", s)
    } else {
        s.to_owned()
    };

    if let Ok(addr) = candidate.parse::<SocketAddr>() {
        return Ok(addr);
    }

    candidate
        .to_socket_addrs()
        .map_err(|e| ConfigError::MsgCause("unable to resolve listen address", s.to_owned(), Box::new(e)))?
        .next()
        .ok_or_else(|| ConfigError::Msg("no addresses for listen address", s.to_owned()))
}

/// Validate the path metrics are exposed at. It must be absolute.
pub fn metrics_path(s: &str) -> Result<String, ConfigError> {
    if s.starts_with('/') {
        Ok(s.to_owned())
    } else {
        Err(ConfigError::Msg("metrics path must start with '/'", s.to_owned()))
    }
}

/// Parse a scrape timeout as a duration such as `3s`, `500ms`, or `1m30s`. Zero is
/// not a usable timeout and is rejected.
pub fn scrape_timeout(s: &str) -> Result<Duration, ConfigError> {
    let timeout = duration(s)?;
    if timeout.is_zero() {
        return Err(ConfigError::Msg("scrape timeout must be greater than zero", s.to_owned()));
    }

    Ok(timeout)
}

/// Parse a sequence of decimal numbers each followed by a unit (`ns`, `us`, `µs`, `ms`,
/// `s`, `m`, `h`), e.g. `1.5s` or `2h45m`.
pub fn duration(s: &str) -> Result<Duration, ConfigError> {
    let input = s.trim();
    if input.is_empty() {
        return Err(ConfigError::Msg("empty duration", s.to_owned()));
    }

    let mut rest = input;
    let mut nanos = 0.0_f64;

    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_end == 0 {
            return Err(ConfigError::Msg("expected a number in duration", s.to_owned()));
        }

        let (num, tail) = rest.split_at(num_end);
        let value: f64 = num
            .parse()
            .map_err(|e| ConfigError::MsgCause("invalid number in duration", s.to_owned(), Box::new(e)))?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);

        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(ConfigError::Msg("missing unit in duration", s.to_owned())),
            _ => return Err(ConfigError::Msg("unknown unit in duration", s.to_owned())),
        };

        nanos += value * scale;
        rest = next;
    }

    Ok(Duration::from_nanos(nanos.round() as u64))
}

#[cfg(test)]
mod test {
    use super::{duration, listen_address, log_level, metrics_path, scrape_timeout};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tracing::Level;

    #[test]
    fn test_log_level_known() {
        assert_eq!(Level::DEBUG, log_level("debug"));
        assert_eq!(Level::INFO, log_level("info"));
        assert_eq!(Level::WARN, log_level("warning"));
        assert_eq!(Level::WARN, log_level("WARN"));
        assert_eq!(Level::ERROR, log_level("Error"));
    }

    #[test]
    fn test_log_level_fallback() {
        assert_eq!(Level::INFO, log_level("verbose"));
        assert_eq!(Level::INFO, log_level(""));
    }

    #[test]
    fn test_listen_address_port_only() {
        let addr = listen_address(":10015").unwrap();
        assert_eq!(SocketAddr::from(([0, 0, 0, 0], 10015)), addr);
    }

    #[test]
    fn test_listen_address_ip_and_port() {
        let addr = listen_address("127.0.0.1:9000").unwrap();
        assert_eq!(SocketAddr::from(([127, 0, 0, 1], 9000)), addr);

        let addr = listen_address("[::1]:9000").unwrap();
        assert_eq!(9000, addr.port());
        assert!(addr.is_ipv6());
    }

    #[test]
    fn test_listen_address_invalid() {
        assert!(listen_address("10015").is_err());
        assert!(listen_address(":notaport").is_err());
    }

    #[test]
    fn test_metrics_path() {
        assert_eq!("/metrics", metrics_path("/metrics").unwrap());
        assert!(metrics_path("metrics").is_err());
    }

    #[test]
    fn test_duration_single_unit() {
        assert_eq!(Duration::from_secs(3), duration("3s").unwrap());
        assert_eq!(Duration::from_millis(500), duration("500ms").unwrap());
        assert_eq!(Duration::from_micros(20), duration("20us").unwrap());
        assert_eq!(Duration::from_nanos(7), duration("7ns").unwrap());
        assert_eq!(Duration::from_secs(7200), duration("2h").unwrap());
    }

    #[test]
    fn test_duration_fractional_and_compound() {
        assert_eq!(Duration::from_millis(1500), duration("1.5s").unwrap());
        assert_eq!(Duration::from_secs(90), duration("1m30s").unwrap());
        assert_eq!(Duration::from_secs(9900), duration("2h45m").unwrap());
    }

    #[test]
    fn test_duration_invalid() {
        assert!(duration("").is_err());
        assert!(duration("3").is_err());
        assert!(duration("3 s").is_err());
        assert!(duration("-3s").is_err());
        assert!(duration("3d").is_err());
        assert!(duration("1..5s").is_err());
    }

    #[test]
    fn test_scrape_timeout_zero() {
        assert!(scrape_timeout("0s").is_err());
        assert_eq!(Duration::from_secs(3), scrape_timeout("3s").unwrap());
    }
}
