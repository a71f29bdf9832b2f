//! The [`ServerApi`] trait.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::types::within;
use crate::{ApiError, ApiRequest, ApiResponse, QueuePosition, QueuePromptResponse, QueueStatus, SystemStats};

/// Route used for liveness and for queueing prompts.
pub const PROMPT_ROUTE: &str = "/prompt";

/// HTTP access to the server.
///
/// Only [`send`](ServerApi::send) is required. The other methods are the
/// typed calls the client core makes, expressed in terms of `send`, so a
/// test double only has to answer requests.
///
/// Object-safe: the client stores it as `Arc<dyn ServerApi>`.
#[async_trait]
pub trait ServerApi: Send + Sync + 'static {
    /// Performs one request. Any status is a successful exchange here;
    /// the typed methods decide which statuses are errors.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;

    /// `GET /prompt` within `timeout`. Anything but a `200` is an error.
    ///
    /// On expiry the in-flight request is dropped and
    /// [`ApiError::Timeout`] returned.
    async fn poll_status(&self, timeout: Duration) -> Result<QueueStatus, ApiError> {
        let response = within(timeout, self.send(ApiRequest::get(PROMPT_ROUTE))).await?;
        response.expect_ok(PROMPT_ROUTE)?.json()
    }

    /// `GET /object_info/<node>`. An empty object means the server has no
    /// such node and yields `None`.
    async fn node_defs(&self, node: &str) -> Result<Option<Map<String, Value>>, ApiError> {
        let route = format!("/object_info/{}", urlencoding::encode(node));
        let response = self.send(ApiRequest::get(&route)).await?;
        let defs: Map<String, Value> = response.expect_ok(&route)?.json()?;
        Ok((!defs.is_empty()).then_some(defs))
    }

    /// `GET /system_stats`.
    async fn system_stats(&self) -> Result<SystemStats, ApiError> {
        const ROUTE: &str = "/system_stats";
        self.send(ApiRequest::get(ROUTE)).await?.expect_ok(ROUTE)?.json()
    }

    /// `PATCH /internal/logs/subscribe`: turns streaming of server
    /// terminal output to `client_id` on or off.
    async fn set_terminal_subscription(&self, client_id: &str, enabled: bool) -> Result<(), ApiError> {
        const ROUTE: &str = "/internal/logs/subscribe";
        let body = json!({ "clientId": client_id, "enabled": enabled });
        self.send(ApiRequest::patch(ROUTE, body)).await?.expect_ok(ROUTE)?;
        Ok(())
    }

    /// `POST /prompt`: queues `workflow` for execution on behalf of
    /// `client_id`.
    async fn queue_prompt(
        &self,
        client_id: &str,
        position: QueuePosition,
        workflow: Value,
    ) -> Result<QueuePromptResponse, ApiError> {
        let mut body = json!({ "client_id": client_id, "prompt": workflow });
        match position {
            QueuePosition::Back => {}
            QueuePosition::Front => body["front"] = Value::Bool(true),
            QueuePosition::Number(n) => body["number"] = Value::from(n),
        }
        let response = self.send(ApiRequest::post(PROMPT_ROUTE, body)).await?;
        response.expect_ok(PROMPT_ROUTE)?.json()
    }
}
