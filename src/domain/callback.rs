//! Decline callback
//!
//! A ringing call that the user declines can tell the calling server so
//! through `extra.callResponseUrl`. The request is a JSON POST whose body is
//! `extra.declineBody`; `extra.sessionToken`, when present, rides along as a
//! query parameter.

use crate::domain::call::entity::CallData;
use crate::domain::shared::result::Result;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclineCallback {
    pub url: String,
    pub body: Option<String>,
}

impl DeclineCallback {
    /// Callback requested by the call data, if any
    pub fn from_call_data(data: &CallData) -> Option<Self> {
        let url = data.extra.get("callResponseUrl").and_then(Value::as_str)?;
        let url = match data.extra.get("sessionToken").and_then(Value::as_str) {
            Some(token) => format!("{}?sessionToken={}", url, token),
            None => url.to_string(),
        };
        let body = data
            .extra
            .get("declineBody")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self { url, body })
    }
}

/// Outbound HTTP used for server callbacks
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// POST `body` as JSON to `url`; an empty body when `None`
    async fn post_json(&self, url: &str, body: Option<String>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::value_objects::CallId;
    use serde_json::json;

    fn call_with_extra(extra: Value) -> CallData {
        let mut data = CallData::new(CallId::new());
        if let Value::Object(map) = extra {
            data.extra = map;
        }
        data
    }

    #[test]
    fn test_callback_with_session_token() {
        let data = call_with_extra(json!({
            "callResponseUrl": "https://example.com/calls/decline",
            "sessionToken": "s3cr3t",
            "declineBody": "{\"reason\":\"busy\"}"
        }));

        let callback = DeclineCallback::from_call_data(&data).unwrap();
        assert_eq!(callback.url, "https://example.com/calls/decline?sessionToken=s3cr3t");
        assert_eq!(callback.body.as_deref(), Some("{\"reason\":\"busy\"}"));
    }

    #[test]
    fn test_no_url_means_no_callback() {
        let data = call_with_extra(json!({ "sessionToken": "s3cr3t" }));
        assert_eq!(DeclineCallback::from_call_data(&data), None);

        let data = call_with_extra(json!({ "callResponseUrl": "https://example.com/decline" }));
        let callback = DeclineCallback::from_call_data(&data).unwrap();
        assert_eq!(callback.url, "https://example.com/decline");
        assert_eq!(callback.body, None);
    }
}
