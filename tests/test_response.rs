use feedback_aggregator::http::response::{JSON_CONTENT_TYPE, Response, ResponseBuilder, StatusCode};
use feedback_aggregator::http::writer::serialize_response;
use feedback_aggregator::server::handlers::ApiResponse;

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
    assert_eq!(StatusCode::PayloadTooLarge.as_u16(), 413);
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
    assert_eq!(StatusCode::BadGateway.as_u16(), 502);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
    assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    assert_eq!(StatusCode::BadGateway.reason_phrase(), "Bad Gateway");
}

#[test]
fn test_response_builder_auto_content_length() {
    let body = b"This is the body".to_vec();
    let response = ResponseBuilder::new(StatusCode::Ok).body(body.clone()).build();

    assert_eq!(response.headers.get("Content-Length").unwrap(), &body.len().to_string());
}

#[test]
fn test_response_builder_preserves_custom_content_length() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Length", "999")
        .body(b"test".to_vec())
        .build();

    assert_eq!(response.headers.get("Content-Length").unwrap(), "999");
}

#[test]
fn test_response_json_sets_content_type() {
    let response = Response::json(StatusCode::BadGateway, &ApiResponse::error("Cannot deliver message"));

    assert_eq!(response.status, StatusCode::BadGateway);
    assert_eq!(response.headers.get("Content-Type").unwrap(), JSON_CONTENT_TYPE);
    assert_eq!(response.body_text(), r#"{"error":"Cannot deliver message"}"#);
    assert_eq!(response.headers.get("Content-Length").unwrap(), "34");
}

#[test]
fn test_response_connection_close() {
    let response = Response::json(StatusCode::Ok, &ApiResponse::error("x")).with_connection_close();

    assert_eq!(response.headers.get("Connection").unwrap(), "close");
}

#[test]
fn test_response_internal_error_helper() {
    let response = Response::internal_error();

    assert_eq!(response.status, StatusCode::InternalServerError);
    assert_eq!(response.body, b"500 Internal Server Error".to_vec());
}

#[test]
fn test_serialize_response_wire_format() {
    let response = ResponseBuilder::new(StatusCode::NotFound)
        .header("Content-Type", JSON_CONTENT_TYPE)
        .body(br#"{"error":"Incorrect URL"}"#.to_vec())
        .build();

    let wire = String::from_utf8(serialize_response(&response)).unwrap();

    assert_eq!(
        wire,
        "HTTP/1.1 404 Not Found\r\n\
         Content-Length: 25\r\n\
         Content-Type: application/json; charset=utf-8\r\n\
         \r\n\
         {\"error\":\"Incorrect URL\"}"
    );
}
