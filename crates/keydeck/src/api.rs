//! Read-only HTTP status API.
//!
//! - `GET /api/v1/get-config`: the active configuration as JSON

use std::io;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, header},
    middleware,
    response::Response,
    routing::get,
};
use config::Config;
use keydeck_engine::Engine;
use tokio::net::TcpListener;
use tracing::info;

/// Header carrying the daemon version on every response.
pub const VERSION_HEADER: &str = "x-keydeck-version";

/// Build the API router over `engine`.
pub fn router(engine: Engine) -> Router {
    Router::new()
        .route("/api/v1/get-config", get(get_config))
        .layer(middleware::map_response(common_headers))
        .with_state(engine)
}

/// Serialize the active configuration snapshot.
async fn get_config(State(engine): State<Engine>) -> Json<Config> {
    Json(engine.config().as_ref().clone())
}

/// Stamp version and cache headers onto `resp`.
async fn common_headers(mut resp: Response) -> Response {
    let headers = resp.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        VERSION_HEADER,
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    resp
}

/// Serve the API on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, engine: Engine) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "api_listening");
    }
    axum::serve(listener, router(engine)).await
}

#[cfg(test)]
mod tests {
    use keydeck_engine::{
        Registry,
        test_support::{FakeDeck, config_from_ron, test_services},
    };
    use tokio::{
        io::{AsyncReadExt as _, AsyncWriteExt as _},
        net::TcpStream,
    };

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn config_endpoint_serves_json_with_headers() {
        let cfg = config_from_ron(r#"(default_page: "main", pages: {"main": ()})"#).unwrap();
        let engine = Engine::new(FakeDeck::new(4), Registry::with_builtins(), test_services(), cfg);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener, engine));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /api/v1/get-config HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        server.abort();

        let lower = raw.to_ascii_lowercase();
        assert!(lower.starts_with("http/1.1 200"), "{raw}");
        assert!(lower.contains("cache-control: no-cache"));
        assert!(lower.contains(&format!("{}: {}", VERSION_HEADER, env!("CARGO_PKG_VERSION"))));
        assert!(raw.contains("\"default_page\":\"main\""));
        assert!(raw.contains("@@blank"));
    }
}
