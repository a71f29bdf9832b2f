//! Request, response and payload types.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ApiError;

/// The HTTP methods the core uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

/// One call to the server, relative to the API host.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Route beginning with `/`, e.g. `/system_stats`.
    pub route: String,
    /// JSON body, sent with `Content-Type: application/json`.
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(route: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            route: route.into(),
            body: None,
        }
    }

    pub fn post(route: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            route: route.into(),
            body: Some(body),
        }
    }

    pub fn patch(route: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            route: route.into(),
            body: Some(body),
        }
    }
}

/// A completed HTTP exchange: status and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A `200` response with a JSON body.
    pub fn json_ok(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fails with [`ApiError::Status`] unless the status is exactly `200`.
    pub fn expect_ok(self, route: &str) -> Result<Self, ApiError> {
        if self.status == 200 {
            Ok(self)
        } else {
            Err(ApiError::Status {
                status: self.status,
                route: route.to_string(),
            })
        }
    }

    /// Fails with [`ApiError::Status`] unless the status is `2xx`.
    pub fn expect_success(self, route: &str) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Status {
                status: self.status,
                route: route.to_string(),
            })
        }
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Where a queued prompt goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueuePosition {
    /// End of the queue.
    #[default]
    Back,
    /// Ahead of everything already queued.
    Front,
    /// An explicit queue number.
    Number(u32),
}

/// Body of `GET /prompt`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueueStatus {
    #[serde(default)]
    pub exec_info: ExecInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecInfo {
    #[serde(default)]
    pub queue_remaining: u32,
}

/// Body of a successful `POST /prompt`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueuePromptResponse {
    pub prompt_id: String,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub node_errors: Value,
}

/// Body of `GET /system_stats`. Only the parts the client reads are typed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemStats {
    pub system: SystemInfo,
    #[serde(default)]
    pub devices: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemInfo {
    /// e.g. `"posix"` or `"nt"`.
    pub os: String,
    #[serde(default)]
    pub python_version: Option<String>,
    #[serde(default)]
    pub comfyui_version: Option<String>,
}

/// Per-call timeout helper shared by the provided trait methods.
pub(crate) async fn within<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ApiError::Timeout(limit))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_ok_rejects_other_statuses() {
        let err = ApiResponse::new(201, "").expect_ok("/prompt").unwrap_err();
        assert_eq!(err.status(), Some(201));
        assert!(!err.is_unauthorized());

        let err = ApiResponse::new(401, "").expect_ok("/prompt").unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_system_stats_ignores_unknown_fields() {
        let body = r#"{"system":{"os":"posix","ram_total":1},"devices":[{"name":"cuda:0"}]}"#;
        let stats: SystemStats = ApiResponse::new(200, body).json().unwrap();
        assert_eq!(stats.system.os, "posix");
        assert_eq!(stats.devices.len(), 1);
    }

    #[test]
    fn test_queue_status_defaults_missing_fields() {
        let status: QueueStatus = ApiResponse::new(200, "{}").json().unwrap();
        assert_eq!(status.exec_info.queue_remaining, 0);
    }
}
