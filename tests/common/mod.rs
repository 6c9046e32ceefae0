#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use feedback_aggregator::http::request::{Method, Request, RequestBuilder};
use feedback_aggregator::server::{build_router, router::Router};
use feedback_aggregator::sink::{DeliveryError, Sink};
use serde_json::Value;

pub const TEST_TAG: &str = "test-name";

/// Sink that records what it was given and answers with a fixed outcome.
pub struct MockSink {
    posted: Mutex<Vec<(String, Value)>>,
    fail_with: Option<DeliveryError>,
}

impl MockSink {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self { posted: Mutex::new(Vec::new()), fail_with: None })
    }

    pub fn failing(error: DeliveryError) -> Arc<Self> {
        Arc::new(Self { posted: Mutex::new(Vec::new()), fail_with: Some(error) })
    }

    pub fn posted(&self) -> Vec<(String, Value)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for MockSink {
    async fn post(&self, tag: &str, message: &Value) -> Result<(), DeliveryError> {
        self.posted.lock().unwrap().push((tag.to_string(), message.clone()));
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

pub fn router_with(sink: Arc<MockSink>) -> Router {
    build_router(sink, TEST_TAG)
}

pub fn feedback_url(model_id: &str, model_version: &str) -> String {
    format!("/api/model/{}/{}/feedback", model_id, model_version)
}

pub fn request(method: Method, path: &str) -> RequestBuilder {
    RequestBuilder::new().method(method).path(path).version("HTTP/1.1")
}

pub fn post_feedback(model_id: &str, model_version: &str, request_id: Option<&str>) -> Request {
    let mut builder = request(Method::POST, &feedback_url(model_id, model_version));
    if let Some(id) = request_id {
        builder = builder.header("Request-ID", id);
    }
    builder.build().unwrap()
}

pub fn body_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("response body is JSON")
}
