//! Mock canvas backend serving tiles and accepting pixel writes.

use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Wrapper around wiremock MockServer with canvas endpoints
pub struct MockCanvas {
    pub server: MockServer,
}

impl MockCanvas {
    /// Start a new mock canvas
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Base URL of the mock canvas
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Serve `png` as tile (x, y)
    pub async fn mock_tile(&self, x: u32, y: u32, png: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(format!("/files/s0/tiles/{x}/{y}.png")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png)
                    .insert_header("content-type", "image/png"),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer tile (x, y) with an error status
    pub async fn mock_tile_error(&self, x: u32, y: u32, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/files/s0/tiles/{x}/{y}.png")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Accept pixel writes on tile (x, y)
    pub async fn mock_paint(&self, x: u32, y: u32) {
        self.mock_paint_status(x, y, 200).await;
    }

    /// Answer pixel writes on tile (x, y) with `status`
    pub async fn mock_paint_status(&self, x: u32, y: u32, status: u16) {
        Mock::given(method("POST"))
            .and(path(format!("/s0/pixel/{x}/{y}")))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(serde_json::json!({ "painted": 0 })),
            )
            .mount(&self.server)
            .await;
    }

    /// JSON bodies of every pixel write received, in order
    pub async fn paint_requests(&self) -> Vec<(String, serde_json::Value)> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == "POST")
            .map(|r| {
                let body = serde_json::from_slice(&r.body).unwrap();
                (r.url.path().to_string(), body)
            })
            .collect()
    }
}
