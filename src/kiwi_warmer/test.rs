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

#![cfg(test)]

use crate::client::DeviceInfo;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

/// Document from a unit with both sensors attached and every field parseable.
pub(crate) const HAPPY_PATH_JSON: &str = r#"{"deviceId":"AA:BB","deviceName":"room","hw":"1","sw":"2","currentTemperature":"2100","currentTemperature2":"2150","currentHumidity":"4000","currentHumidity2":"4100","workTemperature":"22","heapHealth":"95","isHeating":"1","deviceStatus":"3"}"#;

pub(crate) fn happy_path_info() -> DeviceInfo {
    DeviceInfo {
        device_id: "AA:BB".to_owned(),
        device_name: "room".to_owned(),
        hw: "1".to_owned(),
        sw: "2".to_owned(),
        current_temperature: "2100".to_owned(),
        current_temperature2: "2150".to_owned(),
        current_humidity: "4000".to_owned(),
        current_humidity2: "4100".to_owned(),
        work_temperature: "22".to_owned(),
        heap_health: "95".to_owned(),
        is_heating: "1".to_owned(),
        device_status: "3".to_owned(),
        ..DeviceInfo::default()
    }
}

/// Wrap a document the same way the unit firmware does.
pub(crate) fn encoded(json: &str) -> String {
    STANDARD.encode(json)
}

/// Start a fake unit on a random local port that answers every request with the given
/// status and body, optionally after a delay. The server runs until the test runtime
/// is dropped.
pub(crate) async fn serve_device(status: StatusCode, body: String, delay: Option<Duration>) -> SocketAddr {
    let service = make_service_fn(move |_| {
        let body = body.clone();

        async move {
            Ok::<_, Infallible>(service_fn(move |_req: Request<Body>| {
                let body = body.clone();

                async move {
                    if let Some(d) = delay {
                        tokio::time::sleep(d).await;
                    }

                    let mut res = Response::new(Body::from(body));
                    *res.status_mut() = status;
                    Ok::<_, Infallible>(res)
                }
            }))
        }
    });

    let server = Server::try_bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
        .expect("unable to bind fake unit")
        .serve(service);
    let addr = server.local_addr();
    tokio::spawn(server);
    addr
}

/// Address that nothing is listening on.
pub(crate) fn refused_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("unable to bind local port");
    listener.local_addr().expect("unable to get local address")
}
