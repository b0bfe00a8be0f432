use axum::{body::Body, http::StatusCode, response::Response};
use axum_test::TestResponse;
use serde_json::Value;

/// Read a handler's response body as JSON.
pub(crate) async fn parse_json_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Could not read response body");

    serde_json::from_slice(&body).expect("Response body is not JSON")
}

#[track_caller]
pub(crate) fn assert_error(response: &TestResponse, status: StatusCode) {
    response.assert_status(status);

    let body: Value = response.json();
    assert!(
        body["error"].is_string(),
        "want an error message in the body, got {body}"
    );
}
