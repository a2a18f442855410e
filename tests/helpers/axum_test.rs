// ABOUTME: Request builder for exercising axum routers in integration tests
// ABOUTME: Uses tower::oneshot; no sockets, no running server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response},
    Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower::ServiceExt;

/// Builder for one test request against a router
pub struct AxumTestRequest {
    builder: axum::http::request::Builder,
    body: Body,
}

impl AxumTestRequest {
    fn with_method(method: Method, uri: &str) -> Self {
        Self {
            builder: Request::builder().method(method).uri(uri),
            body: Body::empty(),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::with_method(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::with_method(Method::POST, uri)
    }

    #[allow(dead_code)]
    pub fn delete(uri: &str) -> Self {
        Self::with_method(Method::DELETE, uri)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Attach a JSON body and the matching content type
    pub fn json<T: Serialize>(mut self, payload: &T) -> Self {
        let encoded = serde_json::to_vec(payload).expect("failed to encode request body");
        self.builder = self
            .builder
            .header(header::CONTENT_TYPE, "application/json");
        self.body = Body::from(encoded);
        self
    }

    /// Run the request through the router and collect the full response.
    ///
    /// The whole body is read eagerly; the chat SSE stream is finite (it
    /// ends with a terminal event) so this works for streaming routes too.
    pub async fn send(self, app: Router) -> AxumTestResponse {
        let request = self.builder.body(self.body).expect("invalid test request");
        let response = app.oneshot(request).await.expect("router call failed");
        AxumTestResponse::read(response).await
    }
}

/// A fully-buffered response for assertions
pub struct AxumTestResponse {
    status: u16,
    body: Vec<u8>,
}

impl AxumTestResponse {
    async fn read(response: Response<Body>) -> Self {
        let status = response.status().as_u16();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body")
            .to_vec();
        Self { status, body }
    }

    pub const fn status(&self) -> u16 {
        self.status
    }

    pub fn json<T: DeserializeOwned>(self) -> T {
        serde_json::from_slice(&self.body).expect("response body is not the expected JSON")
    }

    pub fn text(self) -> String {
        String::from_utf8(self.body).expect("response body is not UTF-8")
    }
}
