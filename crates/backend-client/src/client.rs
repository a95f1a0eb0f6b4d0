use crossbeam_channel::Sender;
use graph_model::{Edge, Node};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::channel::{ChannelEvent, PushChannel};
use crate::error::ClientError;
use crate::wire::{
    EditRequest, ErrorDetail, GeneratedWorkflow, ReviewFeedback, ReviewRequest, ScenarioType,
    SimulateResponse, SimulationRequest,
};

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_WS_URL: &str = "ws://localhost:8000";

/// HTTP + WebSocket client with an embedded tokio runtime.
///
/// The UI thread calls the request methods with a completion callback;
/// the request runs on the runtime and the callback fires from a worker
/// thread once the boundary conversion to [`ClientError`] is done.
pub struct BackendClient {
    api_base: String,
    ws_base: String,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl BackendClient {
    pub fn new(api_base: impl Into<String>, ws_base: impl Into<String>) -> Result<Self, ClientError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            ws_base: ws_base.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            runtime,
        })
    }

    /// Base URLs from `AGENT_PLAYGROUND_API_URL` / `AGENT_PLAYGROUND_WS_URL`,
    /// defaulting to the local development backend.
    pub fn from_env() -> Result<Self, ClientError> {
        let api = std::env::var("AGENT_PLAYGROUND_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let ws = std::env::var("AGENT_PLAYGROUND_WS_URL")
            .unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
        Self::new(api, ws)
    }

    /// Request a generated workflow for a scenario description.
    pub fn generate(
        &self,
        simulation_id: &str,
        scenario_text: &str,
        scenario_type: ScenarioType,
        on_done: impl FnOnce(Result<GeneratedWorkflow, ClientError>) + Send + 'static,
    ) {
        let url = format!("{}/simulate/{}", self.api_base, simulation_id);
        let body = serde_json::json!(SimulationRequest {
            scenario_text,
            scenario_type,
        });
        let http = self.http.clone();
        let fallback_id = simulation_id.to_string();
        debug!(%url, "generation request");
        self.runtime.spawn(async move {
            let result = post_json::<SimulateResponse>(http, url, body).await.map(
                |response| {
                    let (nodes, edges) = response.architecture.into_graph();
                    GeneratedWorkflow {
                        nodes,
                        edges,
                        simulation_id: response.simulation_id.unwrap_or(fallback_id),
                    }
                },
            );
            on_done(result);
        });
    }

    /// Apply a natural-language edit command to the session's workflow.
    pub fn edit(
        &self,
        simulation_id: &str,
        command: &str,
        on_done: impl FnOnce(Result<(Vec<Node>, Vec<Edge>), ClientError>) + Send + 'static,
    ) {
        let url = format!("{}/simulations/{}/edit", self.api_base, simulation_id);
        let body = serde_json::json!(EditRequest { command });
        let http = self.http.clone();
        debug!(%url, "natural-language edit request");
        self.runtime.spawn(async move {
            let result =
                post_json::<crate::wire::AgentNetworkArchitecture>(http, url, body)
                    .await
                    .map(|architecture| architecture.into_graph());
            on_done(result);
        });
    }

    /// Request scored feedback for the current graph.
    pub fn review(
        &self,
        simulation_id: &str,
        nodes: &[Node],
        edges: &[Edge],
        on_done: impl FnOnce(Result<ReviewFeedback, ClientError>) + Send + 'static,
    ) {
        let url = format!("{}/simulations/{}/review", self.api_base, simulation_id);
        let body = serde_json::json!(ReviewRequest { nodes, edges });
        let http = self.http.clone();
        debug!(%url, "feedback request");
        self.runtime.spawn(async move {
            on_done(post_json::<ReviewFeedback>(http, url, body).await);
        });
    }

    /// Open the push channel for a session. Events arrive on `events`
    /// until [`PushChannel::disconnect`] (or drop).
    pub fn open_channel(&self, simulation_id: &str, events: Sender<ChannelEvent>) -> PushChannel {
        let url = format!("{}/ws/{}", self.ws_base, simulation_id);
        PushChannel::open(self.runtime.handle(), url, simulation_id.to_string(), events)
    }
}

async fn post_json<T: DeserializeOwned>(
    http: reqwest::Client,
    url: String,
    body: serde_json::Value,
) -> Result<T, ClientError> {
    let response = http.post(&url).json(&body).send().await?;
    let status = response.status();
    if !status.is_success() {
        // The backend reports failures as `{detail}`.
        let message = match response.json::<ErrorDetail>().await {
            Ok(detail) => detail.detail,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        return Err(ClientError::Remote {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|err| ClientError::Decode(err.to_string()))
}
