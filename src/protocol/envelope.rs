//! Request and response envelope structs.
//!
//! Optional fields use `skip_serializing_if` so that an absent field is
//! truly absent on the wire - peers check for the *absence* of `error` on
//! success and of `result` on failure, not for a null.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{INTERNAL_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND};

/// Message sent when a payload is not a well-formed request.
pub const INVALID_REQUEST_MSG: &str = "Did not receive valid JSON-RPC data.";
/// Message sent when a request names an unregistered method.
pub const METHOD_NOT_FOUND_MSG: &str = "Requested method does not exist.";

/// A JSON-RPC request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Version tag; omitted unless the caller's protocol requires it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    /// Request identifier; any JSON value.
    pub id: Value,
    /// Name of the method to invoke.
    pub method: String,
    /// Positional arguments.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Request {
    /// Build a request envelope without a version tag.
    pub fn new(id: Value, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: None,
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC response envelope.
///
/// Invariant: exactly one of `result` and `error` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Version tag mirrored from the request, when the request carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    /// Identifier mirrored from the request; `null` for malformed requests.
    #[serde(default)]
    pub id: Value,
    /// Success result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Build a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: None,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn failure(id: Value, error: ErrorObject) -> Self {
        Self {
            jsonrpc: None,
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Mirror the request's version tag, if it carried one.
    pub fn with_version(mut self, jsonrpc: Option<String>) -> Self {
        self.jsonrpc = jsonrpc;
        self
    }
}

/// A JSON-RPC error object.
///
/// Deserialization is tolerant of non-standard envelopes: some peers send
/// the error member as a bare string rather than a `{code, message}`
/// object. Any shape becomes an error object carrying that shape's text
/// as the message, with the internal-error code when none is given.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorObject {
    /// Numeric error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

impl<'de> Deserialize<'de> for ErrorObject {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        Ok(match value {
            Value::String(message) => Self {
                code: INTERNAL_ERROR,
                message,
            },
            Value::Object(ref obj) => Self {
                code: obj
                    .get("code")
                    .and_then(Value::as_i64)
                    .map(|code| code as i32)
                    .unwrap_or(INTERNAL_ERROR),
                message: match obj.get("message") {
                    Some(Value::String(message)) => message.clone(),
                    Some(other) => other.to_string(),
                    None => value.to_string(),
                },
            },
            other => Self {
                code: INTERNAL_ERROR,
                message: other.to_string(),
            },
        })
    }
}

impl ErrorObject {
    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self {
            code: INVALID_REQUEST,
            message: INVALID_REQUEST_MSG.to_string(),
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found() -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: METHOD_NOT_FOUND_MSG.to_string(),
        }
    }

    /// Internal error (-32603) wrapping a handler's failure message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_version_when_absent() {
        let req = Request::new(json!(1), "echo", vec![json!("hi")]);
        let serialized = serde_json::to_string(&req).unwrap();

        assert!(!serialized.contains("jsonrpc"));
        assert!(serialized.contains("\"method\":\"echo\""));
        assert!(serialized.contains("\"id\":1"));
    }

    #[test]
    fn test_request_params_default_to_empty() {
        let req: Request = serde_json::from_value(json!({
            "id": 5,
            "method": "noargs"
        }))
        .unwrap();

        assert!(req.params.is_empty());
        assert_eq!(req.jsonrpc, None);
    }

    #[test]
    fn test_success_response_has_no_error_key() {
        let resp = Response::success(json!(1), json!({"hello": "world"}));
        let value = serde_json::to_value(&resp).unwrap();

        assert_eq!(value["id"], json!(1));
        assert_eq!(value["result"], json!({"hello": "world"}));
        assert!(value.get("error").is_none());
        assert!(value.get("jsonrpc").is_none());
    }

    #[test]
    fn test_error_response_has_no_result_key() {
        let resp = Response::failure(json!(2), ErrorObject::method_not_found());
        let value = serde_json::to_value(&resp).unwrap();

        assert_eq!(value["id"], json!(2));
        assert_eq!(value["error"]["code"], json!(METHOD_NOT_FOUND));
        assert_eq!(
            value["error"]["message"],
            json!("Requested method does not exist.")
        );
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_version_is_mirrored() {
        let resp = Response::success(json!(1), json!(true)).with_version(Some("2.0".to_string()));
        let value = serde_json::to_value(&resp).unwrap();

        assert_eq!(value["jsonrpc"], json!("2.0"));
    }

    #[test]
    fn test_response_deserializes_without_id() {
        let resp: Response = serde_json::from_value(json!({ "result": 42 })).unwrap();
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.result, Some(json!(42)));
    }

    #[test]
    fn test_bare_string_error_member_is_accepted() {
        let resp: Response = serde_json::from_value(json!({
            "id": 1,
            "error": "I have no idea what I'm doing."
        }))
        .unwrap();

        let error = resp.error.unwrap();
        assert_eq!(error.message, "I have no idea what I'm doing.");
        assert_eq!(error.code, INTERNAL_ERROR);
    }

    #[test]
    fn test_error_object_without_code_gets_internal_code() {
        let error: ErrorObject =
            serde_json::from_value(json!({"message": "no code here"})).unwrap();

        assert_eq!(error.code, INTERNAL_ERROR);
        assert_eq!(error.message, "no code here");
    }

    #[test]
    fn test_error_constructors() {
        assert_eq!(ErrorObject::invalid_request().code, -32600);
        assert_eq!(ErrorObject::method_not_found().code, -32601);
        assert_eq!(ErrorObject::internal("boom").code, -32603);
        assert_eq!(ErrorObject::internal("boom").message, "boom");
    }
}
