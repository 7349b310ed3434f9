//! Concierge agent runtime.
//!
//! - `llm` / `openai` / `retry`: OpenAI-compatible chat and embedding transport
//! - `tools` / `skills`: the tool catalog the model may call
//! - `runtime`: the tool-calling loop over a conversation thread
//! - `evaluation`: dataset replay and LLM-as-judge scoring
//!
//! The model only chooses tools and phrases answers. Availability and booking
//! outcomes always come from the inventory store.

pub mod conversation;
pub mod embedding;
pub mod evaluation;
pub mod llm;
pub mod openai;
pub mod prompts;
pub mod retry;
pub mod runtime;
pub mod skills;
pub mod tools;

pub use embedding::{build_embedder, Embedder, HashingEmbedder};
pub use llm::{build_chat_model, ChatModel};
pub use runtime::{AgentError, AgentReply, AgentRuntime, ConversationThread, TurnEvent};
pub use skills::ConciergeSkills;
pub use tools::{Tool, ToolRegistry};
