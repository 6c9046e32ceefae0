//! Request handlers for the feedback API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::server::middleware::DeliveryContext;
use crate::server::router::PathParams;

/// Submission route, also advertised by the index.
pub const FEEDBACK_URI: &str = "/api/model/:model_id/:model_version/feedback";

pub const REQUEST_ID_HEADER: &str = "Request-ID";

/// Set by the model gateway; preferred over `Request-ID` when both are sent.
pub const LEGION_REQUEST_ID_HEADER: &str = "Legion-Request-ID";

pub const MODEL_ID_PARAM: &str = "model_id";
pub const MODEL_VERSION_PARAM: &str = "model_version";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// One piece of feedback on a model prediction, as sent downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub model_id: String,
    pub model_version: String,
    pub payload: Value,
    pub request_id: String,
}

/// Every JSON body the API answers with.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ApiResponse {
    Links {
        links: Vec<&'static str>,
    },
    Registered {
        error: bool,
        registered: bool,
        message: FeedbackRecord,
    },
    Error {
        error: String,
    },
}

impl ApiResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { error: message.into() }
    }

    pub fn registered(message: FeedbackRecord) -> Self {
        Self::Registered {
            error: false,
            registered: true,
            message,
        }
    }
}

/// `GET /`: lists the submission URL.
pub fn index() -> Response {
    Response::json(StatusCode::Ok, &ApiResponse::Links { links: vec![FEEDBACK_URI] })
}

/// Fallback for anything no route matched.
pub fn not_found() -> Response {
    Response::json(StatusCode::NotFound, &ApiResponse::error("Incorrect URL"))
}

/// `POST /api/model/:model_id/:model_version/feedback`
///
/// Validates identifiers, builds the record and makes exactly one delivery
/// call. Bad identifiers answer 404, not 400; clients rely on that.
pub async fn submit_feedback(req: &Request, params: &PathParams, ctx: &DeliveryContext) -> Response {
    let model_id = params.get(MODEL_ID_PARAM).unwrap_or_default();
    let model_version = params.get(MODEL_VERSION_PARAM).unwrap_or_default();

    if model_id.is_empty() || model_version.is_empty() {
        return Response::json(
            StatusCode::NotFound,
            &ApiResponse::error("Incorrect model_id / model_version field value"),
        );
    }

    let request_id = match find_request_id(req) {
        Some(id) => id.to_string(),
        None => {
            return Response::json(
                StatusCode::BadRequest,
                &ApiResponse::error(format!("{} header is missed", REQUEST_ID_HEADER)),
            );
        }
    };

    let record = FeedbackRecord {
        model_id: model_id.to_string(),
        model_version: model_version.to_string(),
        payload: extract_payload(req),
        request_id,
    };

    let message = match serde_json::to_value(&record) {
        Ok(message) => message,
        Err(e) => {
            tracing::error!(error = %e, "Cannot encode feedback record");
            return Response::internal_error();
        }
    };

    match ctx.deliver(&message).await {
        Ok(total) => {
            tracing::debug!(
                model_id = %record.model_id,
                model_version = %record.model_version,
                request_id = %record.request_id,
                tag = ctx.tag(),
                total,
                "Feedback registered"
            );
            Response::json(StatusCode::Ok, &ApiResponse::registered(record))
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                model_id = %record.model_id,
                model_version = %record.model_version,
                request_id = %record.request_id,
                "Cannot deliver message"
            );
            Response::json(StatusCode::BadGateway, &ApiResponse::error("Cannot deliver message"))
        }
    }
}

/// First non-empty of `Legion-Request-ID` and `Request-ID`.
fn find_request_id(req: &Request) -> Option<&str> {
    [LEGION_REQUEST_ID_HEADER, REQUEST_ID_HEADER]
        .into_iter()
        .filter_map(|name| req.header(name))
        .find(|id| !id.is_empty())
}

/// Turns the request body into the record payload.
///
/// Form bodies become an object of fields; anything else is read as JSON.
/// Empty or unreadable bodies give an empty object.
pub fn extract_payload(req: &Request) -> Value {
    if req.body.iter().all(u8::is_ascii_whitespace) {
        return Value::Object(Map::new());
    }

    if req.content_type().as_deref() == Some(FORM_CONTENT_TYPE) {
        return parse_form(&req.body);
    }

    match serde_json::from_slice::<Value>(&req.body) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, bytes = req.body.len(), "Body is not JSON, using empty payload");
            Value::Object(Map::new())
        }
    }
}

/// Single-valued keys map to a string, repeated keys to an array.
fn parse_form(body: &[u8]) -> Value {
    let mut fields: Map<String, Value> = Map::new();

    for (key, value) in url::form_urlencoded::parse(body) {
        let value = Value::String(value.into_owned());
        match fields.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                fields.insert(key.into_owned(), value);
            }
        }
    }

    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{Method, RequestBuilder};
    use serde_json::json;

    fn post(content_type: Option<&str>, body: &str) -> Request {
        let mut builder = RequestBuilder::new()
            .method(Method::POST)
            .path("/api/model/m/1/feedback")
            .body(body.as_bytes().to_vec());
        if let Some(ct) = content_type {
            builder = builder.header("Content-Type", ct);
        }
        builder.build().unwrap()
    }

    #[test]
    fn empty_body_gives_empty_object() {
        assert_eq!(extract_payload(&post(None, "")), json!({}));
        assert_eq!(extract_payload(&post(Some("application/json"), "  \r\n")), json!({}));
    }

    #[test]
    fn json_body_is_kept_as_is() {
        let req = post(Some("application/json"), r#"{"score": 0.7, "tags": ["a"]}"#);

        assert_eq!(extract_payload(&req), json!({"score": 0.7, "tags": ["a"]}));
    }

    #[test]
    fn garbage_body_gives_empty_object() {
        assert_eq!(extract_payload(&post(Some("application/json"), "{not json")), json!({}));
    }

    #[test]
    fn form_body_collects_repeated_keys() {
        let req = post(
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            "label=cat&note=very+good&label=dog",
        );

        assert_eq!(
            extract_payload(&req),
            json!({"label": ["cat", "dog"], "note": "very good"})
        );
    }

    #[test]
    fn error_body_shape() {
        let body = serde_json::to_string(&ApiResponse::error("Incorrect URL")).unwrap();

        assert_eq!(body, r#"{"error":"Incorrect URL"}"#);
    }
}
