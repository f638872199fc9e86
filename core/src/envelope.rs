//! Response decoding for the two wire shapes the service returns.
//!
//! API methods answer with `{ok, error?, result?}`. The upload endpoint
//! answers with a bare `[{"path": ...}]` array on success and an
//! `{"error": ...}` object on failure. Both decoders hand back either the
//! payload or an `ApiError`, never both.

use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::warn;

use crate::error::{ApiError, Result};

/// Method name used in errors raised by the upload endpoint.
pub const UPLOAD_METHOD: &str = "upload";

#[derive(Deserialize)]
struct Envelope<'a> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(borrow, default)]
    result: Option<&'a RawValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct UploadedPath {
    path: String,
}

#[derive(Deserialize)]
struct UploadFailure {
    error: String,
}

/// Decode an API envelope and return the raw `result` payload.
pub fn decode_envelope(method: &str, body: &str) -> Result<Box<RawValue>> {
    let envelope: Envelope<'_> = serde_json::from_str(body)
        .map_err(|e| ApiError::transport(method, format!("malformed response: {e}")))?;

    if !envelope.ok {
        let message = envelope
            .error
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "request failed without an error message".to_string());
        warn!(method, error = %message, "remote reported failure");
        return Err(ApiError::remote(method, message));
    }

    envelope
        .result
        .map(RawValue::to_owned)
        .ok_or_else(|| ApiError::transport(method, "response has ok=true but no result"))
}

/// Decode an upload response into the path of the first uploaded file.
pub fn decode_upload(body: &str) -> Result<String> {
    if let Ok(uploaded) = serde_json::from_str::<Vec<UploadedPath>>(body) {
        return uploaded
            .into_iter()
            .next()
            .map(|u| u.path)
            .ok_or_else(|| ApiError::remote(UPLOAD_METHOD, "upload returned no files"));
    }

    match serde_json::from_str::<UploadFailure>(body) {
        Ok(failure) => {
            warn!(error = %failure.error, "upload rejected");
            Err(ApiError::remote(UPLOAD_METHOD, failure.error))
        }
        Err(e) => Err(ApiError::transport(
            UPLOAD_METHOD,
            format!("malformed upload response: {e}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_exposes_raw_result() {
        let result = decode_envelope("getViews", r#"{"ok":true,"result":{"x":1}}"#).unwrap();
        assert_eq!(result.get(), r#"{"x":1}"#);
    }

    #[test]
    fn failed_envelope_is_remote_error() {
        let err = decode_envelope("createPage", r#"{"ok":false,"error":"boom"}"#).unwrap_err();
        match err {
            ApiError::Remote { method, message } => {
                assert_eq!(method, "createPage");
                assert!(message.contains("boom"));
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn failed_envelope_ignores_leftover_result() {
        let err = decode_envelope("getPage", r#"{"ok":false,"error":"PAGE_NOT_FOUND","result":{"path":"x"}}"#)
            .unwrap_err();
        assert!(matches!(err, ApiError::Remote { .. }));
    }

    #[test]
    fn failed_envelope_without_message_still_fails() {
        let err = decode_envelope("getPage", r#"{"ok":false}"#).unwrap_err();
        assert!(matches!(err, ApiError::Remote { .. }));
    }

    #[test]
    fn malformed_body_is_transport_error() {
        let err = decode_envelope("getAccountInfo", "<html>502 Bad Gateway</html>").unwrap_err();
        match &err {
            ApiError::Transport { method, .. } => assert_eq!(method, "getAccountInfo"),
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[test]
    fn ok_without_result_is_transport_error() {
        let err = decode_envelope("getViews", r#"{"ok":true}"#).unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }

    #[test]
    fn upload_array_yields_first_path() {
        let path = decode_upload(r#"[{"path":"/file/abc.jpg"}]"#).unwrap();
        assert_eq!(path, "/file/abc.jpg");
    }

    #[test]
    fn upload_error_object_is_remote_error() {
        let err = decode_upload(r#"{"error":"too large"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Remote { .. }));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn upload_empty_array_is_remote_error() {
        let err = decode_upload("[]").unwrap_err();
        assert!(matches!(err, ApiError::Remote { .. }));
    }

    #[test]
    fn upload_garbage_is_transport_error() {
        let err = decode_upload("Service Unavailable").unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }
}
