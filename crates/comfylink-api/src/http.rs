use std::sync::Arc;

use async_trait::async_trait;
use comfylink_session::Session;

use crate::{ApiError, ApiRequest, ApiResponse, ServerApi};

/// [`ServerApi`] over `reqwest`, sending the session's credential headers
/// with every request.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    session: Arc<Session>,
}

impl HttpApi {
    /// # Errors
    /// Returns [`ApiError::Http`] if the HTTP client cannot be built.
    pub fn new(session: Arc<Session>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, session))
    }

    /// Uses a pre-configured `reqwest` client.
    pub fn with_client(client: reqwest::Client, session: Arc<Session>) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

#[async_trait]
impl ServerApi for HttpApi {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.session.api_url(&request.route);
        let mut builder = self.client.request(request.method.into(), &url);
        for (name, value) in self.session.credential_headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        tracing::trace!(method = ?request.method, route = %request.route, status, "api call");
        Ok(ApiResponse { status, body })
    }
}
