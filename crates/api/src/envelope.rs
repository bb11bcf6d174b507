//! Response envelope of the REST API.
//!
//! Every method response carries `stat`. On success the rest of the object
//! is the payload; on failure `err` holds `msg` and `code`.

use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Success(Value),
    Failure { msg: String, code: i64 },
}

impl Envelope {
    /// Parse a response body.
    pub fn decode(body: &str) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_str(body.trim())
            .map_err(|e| ApiError::MalformedResponse(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        let stat = value["stat"]
            .as_str()
            .ok_or_else(|| ApiError::MalformedResponse("missing stat".into()))?;
        if stat == "ok" {
            return Ok(Self::Success(value));
        }

        let err = value
            .get("err")
            .filter(|e| e.is_object())
            .ok_or_else(|| ApiError::MalformedResponse(format!("stat '{stat}' without err")))?;
        let msg = err["msg"]
            .as_str()
            .ok_or_else(|| ApiError::MalformedResponse("err without msg".into()))?
            .to_string();
        let code = err["code"]
            .as_i64()
            .or_else(|| err["code"].as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| ApiError::MalformedResponse("err without numeric code".into()))?;
        Ok(Self::Failure { msg, code })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Success payload, or the remote error.
    pub fn into_result(self) -> Result<Value, ApiError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure { msg, code } => Err(ApiError::RemoteApi { code, msg }),
        }
    }
}

/// Read a string (or integer, rendered as a string) at `path`.
pub fn str_at(value: &Value, path: &[&str]) -> Result<String, ApiError> {
    let mut node = value;
    for key in path {
        node = node
            .get(*key)
            .ok_or_else(|| ApiError::MalformedResponse(format!("missing {}", path.join("."))))?;
    }
    node.as_str()
        .map(String::from)
        .or_else(|| node.as_i64().map(|n| n.to_string()))
        .ok_or_else(|| ApiError::MalformedResponse(format!("{} is not a string", path.join("."))))
}
