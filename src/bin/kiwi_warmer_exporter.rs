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

use clap::{crate_version, Parser};
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use kiwi_warmer::client::DeviceClient;
use kiwi_warmer::config;
use kiwi_warmer::http::{http_route, RequestContext};
use kiwi_warmer::metrics::{KiwiWarmerCollector, MetricsExposition};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{io, process};
use tokio::runtime::Handle;
use tokio::signal::unix::{self, SignalKind};
use tracing::{event, span, Instrument, Level};

#[derive(Debug, Parser)]
#[clap(name = "kiwi_warmer_exporter", version = crate_version!())]
struct KiwiWarmerApplication {
    /// Logging verbosity. Allowed values are 'debug', 'info', 'warning', and 'error'.
    /// Anything else is treated as 'info'
    #[clap(long = "log-level", default_value = "info")]
    log_level: String,

    /// Address to listen on for HTTP requests, as 'host:port' or ':port' for all interfaces
    #[clap(long = "web.listen-address", default_value = ":10015", value_parser = config::listen_address)]
    listen_address: SocketAddr,

    /// Path to expose metrics on
    #[clap(long = "web.metrics-path", default_value = "/metrics", value_parser = config::metrics_path)]
    metrics_path: String,

    /// [REQUIRED] The address of the Kiwi Warmer, as 'host:port'
    #[clap(long = "kw.address", default_value = "")]
    kw_address: String,

    /// The timeout for each request to the Kiwi Warmer, e.g. '3s' or '500ms'
    #[clap(long = "kw.scrape-timeout", default_value = "3s", value_parser = config::scrape_timeout)]
    scrape_timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let opts = KiwiWarmerApplication::parse();
    let log_level = config::log_level(&opts.log_level);
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let startup = Instant::now();

    // Probe the unit once so that a bad address shows up in the logs right away. Keep
    // going if it fails, the unit may simply not be up yet.
    let client = DeviceClient::new(opts.kw_address.clone(), opts.scrape_timeout);
    match client.fetch().instrument(span!(Level::DEBUG, "kiwi_warmer_probe")).await.result {
        Ok(info) => {
            event!(
                Level::INFO,
                message = "unit responded to startup probe",
                name = %info.device_name,
                mac_address = %info.device_id,
                hardware_version = %info.hw,
                software_version = %info.sw,
            );
        }
        Err(e) => {
            event!(
                Level::WARN,
                message = "unable to get device info from unit, continuing anyway",
                address = %opts.kw_address,
                error = %e,
            );
        }
    }

    let collector = KiwiWarmerCollector::new(client, Handle::current()).unwrap_or_else(|e| {
        event!(
            Level::ERROR,
            message = "failed to create unit metric collector",
            error = %e,
        );

        process::exit(1)
    });

    let reg = prometheus::default_registry().clone();
    reg.register(Box::new(collector)).unwrap_or_else(|e| {
        event!(
            Level::ERROR,
            message = "failed to register unit metric collector",
            error = %e,
        );

        process::exit(1)
    });

    let metrics = MetricsExposition::new(reg);
    let context = Arc::new(RequestContext::new(metrics, opts.metrics_path.clone()));
    let service = make_service_fn(move |_| {
        let context = context.clone();

        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                http_route(req, context.clone()).instrument(span!(Level::DEBUG, "kiwi_warmer_request"))
            }))
        }
    });

    let server = Server::try_bind(&opts.listen_address).unwrap_or_else(|e| {
        event!(
            Level::ERROR,
            message = "server failed to start",
            address = %opts.listen_address,
            error = %e,
        );

        process::exit(1);
    });

    event!(
        Level::INFO,
        message = "starting Kiwi Warmer exporter",
        log_level = %log_level,
        listen_address = %opts.listen_address,
        metrics_path = %opts.metrics_path,
        kw_address = %opts.kw_address,
        scrape_timeout = ?opts.scrape_timeout,
    );

    server
        .serve(service)
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    event!(
        Level::INFO,
        message = "server shutdown",
        runtime_secs = %startup.elapsed().as_secs(),
    );

    Ok(())
}

async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

async fn sigint() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
