//! HTTP calls the comfylink core depends on.
//!
//! [`ServerApi`] is the seam: implementations provide [`ServerApi::send`]
//! and inherit the typed calls (liveness, node introspection, system
//! stats, terminal subscription, prompt queueing) built on top of it.
//! [`HttpApi`] is the production implementation over `reqwest`.

mod api;
mod error;
mod http;
mod types;

pub use api::{ServerApi, PROMPT_ROUTE};
pub use error::ApiError;
pub use http::HttpApi;
pub use types::{
    ApiRequest, ApiResponse, ExecInfo, Method, QueuePosition, QueuePromptResponse, QueueStatus,
    SystemInfo, SystemStats,
};
