//! # spotctl Core
//!
//! Domain types, traits, and error definitions for spotctl, an LLM-driven
//! Spotify assistant. This crate has **no framework dependencies**: it
//! defines the model that every other crate implements against.
//!
//! ## Layout
//!
//! - [`action`] and [`registry`]: what can be called, and by which name
//! - [`routing`]: which handler group executes a name
//! - [`context`]: per-session state (auth, history, metadata)
//! - [`provider`] and [`message`]: the LLM seam
//! - [`music`]: the remote music service seam

pub mod action;
pub mod context;
pub mod error;
pub mod message;
pub mod music;
pub mod provider;
pub mod registry;
pub mod routing;

// Re-export key types at crate root for ergonomics
pub use action::{ActionCategory, ActionDefinition, ActionExecutionResult, RateLimitPolicy};
pub use context::{AIContext, ConversationMessage, MessageRole, RemoteAuth, ToolCall, ToolResult};
pub use error::{ActionError, ContextError, Error, MusicApiError, ProviderError, Result};
pub use message::{Message, MessageToolCall, Role};
pub use music::{ApiCall, Credentials, MusicService, TokenGrant};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition};
pub use registry::{ActionRegistry, RegistryStats};
pub use routing::{HandlerGroup, Route, infer_route};
