#![allow(dead_code)]
//! Shared helpers for the integration suites: a small multipart body builder
//! and deterministic file fixtures.

use axum::{
    body::Body,
    http::{
        Method, Request,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
};
use upload_bridge::{Adapted, Context, RequestView, UploadError};

pub const BOUNDARY: &str = "----UploadBridgeTestBoundary7MA4YWxk";

/// Fixture files used across the suites, by name and size.
const FIXTURES: [(&str, usize); 7] = [
    ("empty.dat", 0),
    ("tiny0.dat", 128),
    ("tiny1.dat", 7),
    ("small0.dat", 1803),
    ("small1.dat", 329),
    ("medium.dat", 13386),
    ("large.jpg", 2_413_677),
];

/// Contents of a named fixture. The byte pattern never contains CRLF.
pub fn fixture(name: &str) -> Vec<u8> {
    let size = FIXTURES
        .iter()
        .find(|(fixture, _)| *fixture == name)
        .map(|(_, size)| *size)
        .unwrap_or_else(|| panic!("unknown fixture {name}"));
    (0..size).map(|i| (i % 251) as u8).collect()
}

pub fn fixture_size(name: &str) -> u64 {
    fixture(name).len() as u64
}

/// Builds `multipart/form-data` bodies part by part.
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    /// Append a fixture as a file part, using the fixture name as filename.
    pub fn file(self, name: &str, fixture_name: &str) -> Self {
        let data = fixture(fixture_name);
        self.file_named(name, fixture_name, &data)
    }

    pub fn file_named(mut self, name: &str, filename: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Append raw part bytes (headers and content) for malformed cases.
    pub fn raw_part(mut self, headers: &str, content: &[u8]) -> Self {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}\r\n{headers}\r\n\r\n").as_bytes());
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }

    pub fn into_request(self) -> Request<Body> {
        self.into_request_at("/upload")
    }

    pub fn into_request_at(self, uri: &str) -> Request<Body> {
        raw_request(
            Method::POST,
            uri,
            &format!("multipart/form-data; boundary={BOUNDARY}"),
            self.into_bytes(),
        )
    }
}

pub fn raw_request(method: Method, uri: &str, content_type: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .expect("valid request")
}

/// Run `adapted` on a fresh context holding `form`, with a request view.
pub async fn submit(adapted: &Adapted, form: Form) -> Result<RequestView, UploadError> {
    let ctx = adapted.run(Context::new(form.into_request())).await?;
    Ok(ctx.request.expect("context keeps its view"))
}
