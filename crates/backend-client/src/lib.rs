//! Client for the scenario-generation backend.
//!
//! Three request/response contracts (generation, natural-language edit,
//! feedback scoring) plus the per-session WebSocket push channel. All
//! transport failures are converted into [`ClientError`] at this boundary;
//! nothing downstream ever sees a raw reqwest or tungstenite error.
//!
//! Network work runs on an embedded tokio runtime; results are delivered
//! back to the single-threaded UI through callbacks / crossbeam channels.

mod channel;
mod client;
mod error;
mod wire;

pub use channel::{ChannelEvent, PushChannel};
pub use client::BackendClient;
pub use error::ClientError;
pub use wire::{
    Agent, AgentNetworkArchitecture, Connection, GeneratedWorkflow, NodeRef, ReviewFeedback,
    ScenarioType, Tool,
};
