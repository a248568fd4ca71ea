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

use crate::client::{DeviceClient, DeviceInfo, Scrape};
use prometheus::core::{Collector, Desc};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::num::ParseFloatError;
use tokio::runtime::Handle;
use tokio::task;
use tracing::{event, span, Instrument, Level};

const TEMPERATURE_DIVISOR: f64 = 100.0;
const HUMIDITY_DIVISOR: f64 = 10_000.0;
const NO_SCALING: f64 = 1.0;

const SENSOR_0: &str = "0";
const SENSOR_1: &str = "1";

/// Descriptors for every metric the exporter emits, created once at startup.
#[derive(Debug)]
pub struct Descriptors {
    up: Desc,
    duration: Desc,
    info: Desc,
    temperature: Desc,
    humidity: Desc,
    target_temperature: Desc,
    heating: Desc,
    heap_health: Desc,
    device_status: Desc,
}

impl Descriptors {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            up: gauge_desc(
                "kiwi_warmer_up",
                "Whether the Kiwi Warmer unit responded to the scrape",
                &[],
            )?,
            duration: gauge_desc(
                "kiwi_warmer_scrape_duration_seconds",
                "Duration of the query to collect device info",
                &[],
            )?,
            info: gauge_desc(
                "kiwi_warmer_info",
                "Info about the Kiwi Warmer device",
                &["MAC_address", "name", "hardware_version", "software_version"],
            )?,
            temperature: gauge_desc("kiwi_warmer_temperature_celcius", "Current temperature", &["sensor"])?,
            humidity: gauge_desc("kiwi_warmer_humidity_percent", "Current humidity, 0-1", &["sensor"])?,
            target_temperature: gauge_desc("kiwi_warmer_target_temperature_celcius", "Target temperature", &[])?,
            heating: gauge_desc("kiwi_warmer_heating", "Whether the switch is currently heating", &[])?,
            heap_health: gauge_desc("kiwi_warmer_heap_health", "Health of the device's heap", &[])?,
            device_status: gauge_desc("kiwi_warmer_device_status", "Device status", &[])?,
        })
    }

    fn all(&self) -> Vec<&Desc> {
        vec![
            &self.up,
            &self.duration,
            &self.info,
            &self.temperature,
            &self.humidity,
            &self.heating,
            &self.target_temperature,
            &self.heap_health,
            &self.device_status,
        ]
    }
}

fn gauge_desc(name: &str, help: &str, labels: &[&str]) -> prometheus::Result<Desc> {
    Desc::new(
        name.to_owned(),
        help.to_owned(),
        labels.iter().map(|l| (*l).to_owned()).collect(),
        HashMap::new(),
    )
}

/// Gauge samples produced by a single scrape, grouped into one family per descriptor.
#[derive(Debug, Default)]
pub struct Samples {
    families: Vec<MetricFamily>,
}

impl Samples {
    /// Add a gauge sample for `desc`. `label_values` must line up with the variable
    /// labels of the descriptor.
    pub fn gauge(&mut self, desc: &Desc, value: f64, label_values: &[&str]) {
        debug_assert_eq!(desc.variable_labels.len(), label_values.len());

        let mut metric = Metric::default();
        for (name, val) in desc.variable_labels.iter().zip(label_values) {
            let mut pair = LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value((*val).to_owned());
            metric.mut_label().push(pair);
        }

        let mut gauge = Gauge::default();
        gauge.set_value(value);
        metric.set_gauge(gauge);

        self.family(desc).mut_metric().push(metric);
    }

    fn family(&mut self, desc: &Desc) -> &mut MetricFamily {
        let index = match self.families.iter().position(|mf| mf.get_name() == desc.fq_name) {
            Some(i) => i,
            None => {
                let mut mf = MetricFamily::default();
                mf.set_name(desc.fq_name.clone());
                mf.set_help(desc.help.clone());
                mf.set_field_type(MetricType::GAUGE);
                self.families.push(mf);
                self.families.len() - 1
            }
        };

        &mut self.families[index]
    }

    /// Total number of samples across all families.
    pub fn len(&self) -> usize {
        self.families.iter().map(|mf| mf.get_metric().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    pub fn into_families(self) -> Vec<MetricFamily> {
        self.families
    }
}

/// A numeric field from the unit that couldn't be parsed.
#[derive(Debug)]
pub struct FieldParseError {
    key: &'static str,
    value: String,
    cause: ParseFloatError,
}

impl fmt::Display for FieldParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unable to parse {} value {:?}: {}", self.key, self.value, self.cause)
    }
}

impl Error for FieldParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.cause)
    }
}

fn parse_field(key: &'static str, value: &str) -> Result<f64, FieldParseError> {
    value.parse::<f64>().map_err(|cause| FieldParseError {
        key,
        value: value.to_owned(),
        cause,
    })
}

/// Parse a single numeric field, scale it, and add it as a sample. A field that doesn't
/// parse is logged and skipped without affecting any other sample.
fn emit_field(samples: &mut Samples, desc: &Desc, key: &'static str, value: &str, divisor: f64, labels: &[&str]) {
    event!(
        Level::DEBUG,
        message = "parsing device field",
        key = key,
        value = value,
        divisor = divisor,
    );

    match parse_field(key, value) {
        Ok(v) => samples.gauge(desc, v / divisor, labels),
        Err(e) => {
            event!(
                Level::ERROR,
                message = "error parsing device info",
                key = key,
                value = value,
                error = %e,
            );
        }
    }
}

/// Add samples for the temperature, humidity, and status fields of `info`.
pub fn translate(descs: &Descriptors, info: &DeviceInfo, samples: &mut Samples) {
    emit_field(
        samples,
        &descs.temperature,
        "currentTemperature",
        &info.current_temperature,
        TEMPERATURE_DIVISOR,
        &[SENSOR_0],
    );
    emit_field(
        samples,
        &descs.temperature,
        "currentTemperature2",
        &info.current_temperature2,
        TEMPERATURE_DIVISOR,
        &[SENSOR_1],
    );
    emit_field(
        samples,
        &descs.humidity,
        "currentHumidity",
        &info.current_humidity,
        HUMIDITY_DIVISOR,
        &[SENSOR_0],
    );
    emit_field(
        samples,
        &descs.humidity,
        "currentHumidity2",
        &info.current_humidity2,
        HUMIDITY_DIVISOR,
        &[SENSOR_1],
    );
    emit_field(
        samples,
        &descs.target_temperature,
        "workTemperature",
        &info.work_temperature,
        NO_SCALING,
        &[],
    );
    emit_field(
        samples,
        &descs.heap_health,
        "heapHealth",
        &info.heap_health,
        NO_SCALING,
        &[],
    );
    emit_field(samples, &descs.heating, "isHeating", &info.is_heating, NO_SCALING, &[]);
    emit_field(
        samples,
        &descs.device_status,
        "deviceStatus",
        &info.device_status,
        NO_SCALING,
        &[],
    );
}

/// Build every sample for the result of a scrape. A failed scrape only produces the
/// `up` and duration samples.
pub fn scrape_samples(descs: &Descriptors, scrape: &Scrape) -> Samples {
    let mut samples = Samples::default();

    match &scrape.result {
        Ok(info) => {
            samples.gauge(&descs.up, 1.0, &[]);
            samples.gauge(&descs.duration, scrape.seconds(), &[]);
            samples.gauge(
                &descs.info,
                1.0,
                &[
                    info.device_id.as_str(),
                    info.device_name.as_str(),
                    info.hw.as_str(),
                    info.sw.as_str(),
                ],
            );

            translate(descs, info, &mut samples);
        }
        Err(_) => {
            samples.gauge(&descs.up, 0.0, &[]);
            samples.gauge(&descs.duration, scrape.seconds(), &[]);
        }
    }

    samples
}

/// Prometheus collector that queries the unit each time it is collected.
///
/// `collect` blocks the calling thread until the request to the unit completes or times
/// out. It must not be called from an async task, see `MetricsExposition`.
#[derive(Debug)]
pub struct KiwiWarmerCollector {
    client: DeviceClient,
    runtime: Handle,
    descs: Descriptors,
}

impl KiwiWarmerCollector {
    pub fn new(client: DeviceClient, runtime: Handle) -> prometheus::Result<Self> {
        Ok(Self {
            client,
            runtime,
            descs: Descriptors::new()?,
        })
    }
}

impl Collector for KiwiWarmerCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.all()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let scrape = self.runtime.block_on(
            self.client
                .fetch()
                .instrument(span!(Level::DEBUG, "kiwi_warmer_scrape", address = self.client.address())),
        );

        let samples = scrape_samples(&self.descs, &scrape);
        event!(
            Level::DEBUG,
            message = "collected unit samples",
            up = scrape.result.is_ok(),
            num_samples = samples.len(),
        );

        samples.into_families()
    }
}

#[derive(Debug)]
pub enum ExpositionError {
    Runtime(&'static str, Box<dyn Error + Send + Sync + 'static>),
    Encoding(&'static str, Box<dyn Error + Send + Sync + 'static>),
}

impl fmt::Display for ExpositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpositionError::Runtime(msg, ref e) => write!(f, "{}: {}", msg, e),
            ExpositionError::Encoding(msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for ExpositionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExpositionError::Runtime(_, ref e) => Some(e.as_ref()),
            ExpositionError::Encoding(_, ref e) => Some(e.as_ref()),
        }
    }
}

/// Gathers and encodes everything in a registry for each request to the exposition server.
#[derive(Debug)]
pub struct MetricsExposition {
    registry: Registry,
}

impl MetricsExposition {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Collect all metrics from the registry and encode them in the Prometheus text
    /// exposition format.
    pub async fn encoded_text(&self) -> Result<Vec<u8>, ExpositionError> {
        let registry = self.registry.clone();

        // Gathering makes a request to the unit which blocks until it finishes or the
        // scrape timeout elapses. Do it on the blocking pool instead of an async worker.
        task::spawn_blocking(move || {
            let metric_families = registry.gather();
            let mut buffer = Vec::new();

            event!(
                Level::DEBUG,
                message = "encoding metric families to text exposition format",
                num_metrics = metric_families.len(),
            );

            TextEncoder::new()
                .encode(&metric_families, &mut buffer)
                .map_err(|e| ExpositionError::Encoding("unable to encode Prometheus metrics", Box::new(e)))
                .map(|_| buffer)
        })
        .instrument(span!(Level::DEBUG, "kiwi_warmer_gather"))
        .await
        .map_err(|e| ExpositionError::Runtime("unable to gather Prometheus metrics", Box::new(e)))?
    }
}
