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

use crate::metrics::MetricsExposition;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use prometheus::TEXT_FORMAT;
use std::sync::Arc;
use tracing::{event, Level};

const HTML_FORMAT: &str = "text/html; charset=utf-8";

pub struct RequestContext {
    exposition: MetricsExposition,
    metrics_path: String,
}

impl RequestContext {
    pub fn new<S>(exposition: MetricsExposition, metrics_path: S) -> Self
    where
        S: Into<String>,
    {
        RequestContext {
            exposition,
            metrics_path: metrics_path.into(),
        }
    }
}

pub async fn http_route(req: Request<Body>, context: Arc<RequestContext>) -> Result<Response<Body>, hyper::Error> {
    let method = req.method().clone();
    let (is_metrics, is_index) = {
        let path = req.uri().path();
        (path == context.metrics_path, path == "/")
    };

    let res = match method {
        Method::GET if is_metrics => match context.exposition.encoded_text().await {
            Ok(buffer) => with_content_type(Response::new(Body::from(buffer)), TEXT_FORMAT),
            Err(e) => {
                event!(
                    Level::ERROR,
                    message = "error scraping metrics",
                    error = %e,
                );

                http_status_no_body(StatusCode::INTERNAL_SERVER_ERROR)
            }
        },

        _ if is_metrics => http_status_no_body(StatusCode::METHOD_NOT_ALLOWED),

        Method::GET if is_index => {
            let page = landing_page(&context.metrics_path);
            with_content_type(Response::new(Body::from(page)), HTML_FORMAT)
        }

        _ => http_status_no_body(StatusCode::NOT_FOUND),
    };

    Ok(res)
}

fn landing_page(metrics_path: &str) -> String {
    format!(
        "<html>
<head><title>Kiwi Warmer Exporter</title></head>
<body>
<h1>Kiwi Warmer Exporter</h1>
<p><a href=\"{}\">Metrics</a></p>
</body>
</html>
",
        metrics_path
    )
}

fn with_content_type(mut res: Response<Body>, content_type: &'static str) -> Response<Body> {
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    res
}

fn http_status_no_body(code: StatusCode) -> Response<Body> {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = code;
    res
}

#[cfg(test)]
mod test {
    use super::{http_route, RequestContext};
    use crate::metrics::MetricsExposition;
    use hyper::header::CONTENT_TYPE;
    use hyper::{Body, Method, Request, StatusCode};
    use prometheus::{Gauge, Registry};
    use std::sync::Arc;

    fn context(metrics_path: &str) -> Arc<RequestContext> {
        let registry = Registry::new();
        let gauge = Gauge::new("kiwi_warmer_test_gauge", "Gauge for tests").unwrap();
        gauge.set(4.0);
        registry.register(Box::new(gauge)).unwrap();

        Arc::new(RequestContext::new(MetricsExposition::new(registry), metrics_path))
    }

    fn request(method: Method, path: &str) -> Request<Body> {
        Request::builder().method(method).uri(path).body(Body::empty()).unwrap()
    }

    async fn body_text(res: hyper::Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(res.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics() {
        let res = http_route(request(Method::GET, "/metrics"), context("/metrics"))
            .await
            .unwrap();

        assert_eq!(StatusCode::OK, res.status());
        assert_eq!(prometheus::TEXT_FORMAT, res.headers()[CONTENT_TYPE].to_str().unwrap());
        assert!(body_text(res).await.contains("# TYPE kiwi_warmer_test_gauge gauge"));
    }

    #[tokio::test]
    async fn test_metrics_custom_path() {
        let ctx = context("/kiwi");
        let res = http_route(request(Method::GET, "/kiwi"), ctx.clone()).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());

        let res = http_route(request(Method::GET, "/metrics"), ctx).await.unwrap();
        assert_eq!(StatusCode::NOT_FOUND, res.status());
    }

    #[tokio::test]
    async fn test_metrics_wrong_method() {
        let res = http_route(request(Method::POST, "/metrics"), context("/metrics"))
            .await
            .unwrap();

        assert_eq!(StatusCode::METHOD_NOT_ALLOWED, res.status());
    }

    #[tokio::test]
    async fn test_landing_page() {
        let res = http_route(request(Method::GET, "/"), context("/kiwi")).await.unwrap();

        assert_eq!(StatusCode::OK, res.status());
        let body = body_text(res).await;
        assert!(body.contains("<title>Kiwi Warmer Exporter</title>"));
        assert!(body.contains("<a href=\"/kiwi\">Metrics</a>"));
    }

    #[tokio::test]
    async fn test_not_found() {
        let res = http_route(request(Method::GET, "/deviceInfo"), context("/metrics"))
            .await
            .unwrap();

        assert_eq!(StatusCode::NOT_FOUND, res.status());
    }
}
