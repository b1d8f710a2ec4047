//! The agent side of spotctl.
//!
//! A prompt cycle runs **Prompt → Tool calls → Tool results → Next step**:
//!
//! 1. **Record** the user prompt in the session context
//! 2. **Offer** the selected actions to the LLM as tools
//! 3. **Dispatch** each requested tool call through the execution engine, in order
//! 4. **Feed** the results back and loop to step 2
//! 5. **Finish** when the model answers with text only or the step budget runs out

pub mod context;
pub mod loop_runner;
pub mod selection;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use context::{ContextManager, DEFAULT_ACTIVITY_THRESHOLD_MS, RemoteAuthUpdate};
pub use loop_runner::{AgentLoop, AgentResponse, DEFAULT_SYSTEM_PROMPT};
pub use selection::ToolSelection;
pub use stream_event::AgentStreamEvent;
