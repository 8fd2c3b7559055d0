//! In-process HTTP server for fetch tests.
//!
//! Routes:
//! - `/gzip`: gzip-encoded [`GZIP_BODY`] with `Content-Encoding: gzip`
//! - `/corrupt-gzip`: claims gzip, is not
//! - `/brotli`: plain bytes labelled `Content-Encoding: br`
//! - `/json/valid`, `/json/invalid`
//! - `/empty`: 200 with an empty body
//! - `/slow`: answers after 5s
//! - `/status/{code}`: bare status response
//! - `/echo/{header}`: echoes a request header
//! - anything else: `payload for {path}`

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use flate2::Compression;
use flate2::write::GzEncoder;

pub const GZIP_BODY: &str = "<html><body><p>compressed transfer survived</p></body></html>";
pub const VALID_JSON: &str = r#"{"ok":true,"items":[1,2]}"#;

type Hits = Arc<Mutex<HashMap<String, usize>>>;

pub struct TestServer {
    base: String,
    hits: Hits,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let hits: Hits = Arc::default();
        let router = Router::new().fallback(handle).with_state(hits.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        Self { base: format!("http://{addr}"), hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Number of requests received for `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

async fn handle(State(hits): State<Hits>, headers: HeaderMap, uri: Uri) -> Response {
    let path = uri.path().to_string();
    *hits.lock().unwrap().entry(path.clone()).or_default() += 1;

    match path.as_str() {
        "/gzip" => ([(header::CONTENT_ENCODING, "gzip")], gzip(GZIP_BODY.as_bytes())).into_response(),
        "/corrupt-gzip" => ([(header::CONTENT_ENCODING, "gzip")], "definitely not gzip").into_response(),
        "/brotli" => ([(header::CONTENT_ENCODING, "br")], "opaque br bytes").into_response(),
        "/json/valid" => VALID_JSON.into_response(),
        "/json/invalid" => "not json {".into_response(),
        "/empty" => StatusCode::OK.into_response(),
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "finally".into_response()
        }
        p if p.starts_with("/status/") => {
            let code = p["/status/".len()..].parse().unwrap_or(500);
            StatusCode::from_u16(code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response()
        }
        p if p.starts_with("/echo/") => {
            let name = &p["/echo/".len()..];
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
                .into_response()
        }
        p => format!("payload for {p}").into_response(),
    }
}
