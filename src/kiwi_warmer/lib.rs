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

//! Prometheus metrics exporter for a Kiwi Warmer thermostat unit
//!
//! ## Features
//!
//! `kiwi_warmer_exporter` queries the `/deviceInfo` endpoint of a single Kiwi Warmer unit
//! each time it is scraped and emits the readings as Prometheus gauges. The unit wraps its
//! JSON status document in base64 and transmits every number as a string, both of which
//! are undone here. The following metrics are emitted.
//!
//! * `kiwi_warmer_up` - `1` if the unit responded with a usable document, `0` otherwise.
//! * `kiwi_warmer_scrape_duration_seconds` - How long the request to the unit took.
//! * `kiwi_warmer_info{MAC_address, name, hardware_version, software_version}` - Unit metadata.
//! * `kiwi_warmer_temperature_celcius{sensor="0|1"}` - Current temperature, in degrees celsius.
//! * `kiwi_warmer_humidity_percent{sensor="0|1"}` - Current humidity (0-1).
//! * `kiwi_warmer_target_temperature_celcius` - Target temperature.
//! * `kiwi_warmer_heating` - `1` if the unit is currently heating.
//! * `kiwi_warmer_heap_health` - Health of the unit's heap.
//! * `kiwi_warmer_device_status` - Status code reported by the unit.
//!
//! When the unit can't be reached (or replies with something that can't be decoded) only
//! `kiwi_warmer_up` and `kiwi_warmer_scrape_duration_seconds` are emitted. The `celcius`
//! spelling is kept as-is since existing dashboards depend on it.
//!
//! ## Usage
//!
//! ```text
//! ./kiwi_warmer_exporter --kw.address 192.168.1.50:80
//! ```
//!
//! Prometheus metrics are exposed on port `10015` at `/metrics` by default.
//!
//! ```yaml
//! scrape_configs:
//! - job_name: kiwi_warmer_exporter
//!   static_configs:
//!   - targets: ['example:10015']
//! ```
//!

pub mod client;
pub mod config;
pub mod http;
pub mod metrics;
mod test;
