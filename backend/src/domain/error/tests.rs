//! Tests for domain error construction and serialisation.

use super::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case(Error::invalid_request("bad"), ErrorCode::InvalidRequest)]
#[case(Error::not_found("missing"), ErrorCode::NotFound)]
#[case(Error::conflict("clash"), ErrorCode::Conflict)]
#[case(Error::service_unavailable("offline"), ErrorCode::ServiceUnavailable)]
#[case(Error::internal("boom"), ErrorCode::InternalError)]
fn constructors_set_codes(#[case] error: Error, #[case] expected: ErrorCode) {
    assert_eq!(error.code(), expected);
}

#[rstest]
fn try_new_rejects_empty_messages() {
    let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
    assert!(matches!(result, Err(ErrorValidationError::EmptyMessage)));
}

#[rstest]
fn display_uses_message() {
    let error = Error::conflict("user 7 already holds an active membership");
    assert_eq!(
        error.to_string(),
        "user 7 already holds an active membership"
    );
}

#[rstest]
fn serialises_code_in_snake_case_and_skips_missing_details() {
    let value = serde_json::to_value(Error::service_unavailable("pool exhausted"))
        .expect("error serialises");
    assert_eq!(
        value,
        json!({ "code": "service_unavailable", "message": "pool exhausted" })
    );
}

#[rstest]
fn details_survive_serialisation() {
    let error = Error::invalid_request("bad extension").with_details(json!({ "days": 0 }));
    let value = serde_json::to_value(&error).expect("error serialises");
    assert_eq!(value["details"], json!({ "days": 0 }));
}

#[rstest]
#[case(ErrorCode::ServiceUnavailable, true)]
#[case(ErrorCode::InternalError, true)]
#[case(ErrorCode::InvalidRequest, false)]
#[case(ErrorCode::NotFound, false)]
#[case(ErrorCode::Conflict, false)]
fn transient_codes_are_redeliverable(#[case] code: ErrorCode, #[case] transient: bool) {
    assert_eq!(code.is_transient(), transient);
}
