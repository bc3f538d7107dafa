//! Uniform `{success, data|error, warning?}` result envelope.

use serde::Serialize;

use crate::error::CacheError;

/// Error body carried by a failed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&CacheError> for ErrorBody {
    fn from(err: &CacheError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// A value served by an engine plus an optional advisory warning.
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> Served<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn with_warning(value: T, warning: impl Into<String>) -> Self {
        Self {
            value,
            warning: Some(warning.into()),
        }
    }
}

/// Envelope returned by every operation exposed by [`crate::CacheService`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            warning: None,
        }
    }

    pub fn failed(err: &CacheError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.into()),
            warning: None,
        }
    }

    pub fn from_result(result: Result<T, CacheError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failed(&err),
        }
    }

    pub fn from_served(result: Result<Served<T>, CacheError>) -> Self {
        match result {
            Ok(served) => Self {
                warning: served.warning,
                ..Self::ok(served.value)
            },
            Err(err) => Self::failed(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_omits_error_and_warning() {
        let value = serde_json::to_value(Envelope::ok(7)).unwrap();
        assert_eq!(value, json!({"success": true, "data": 7}));
    }

    #[test]
    fn warning_rides_along_with_data() {
        let env = Envelope::from_served(Ok(Served::with_warning(vec![1], "stale")));
        let value = serde_json::to_value(env).unwrap();
        assert_eq!(
            value,
            json!({"success": true, "data": [1], "warning": "stale"})
        );
    }

    #[test]
    fn failure_carries_kind_and_message() {
        let env: Envelope<()> =
            Envelope::from_result(Err(CacheError::NotFound("Account not found".into())));
        let value = serde_json::to_value(env).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "error": {"kind": "not_found", "message": "Account not found"}
            })
        );
    }
}
