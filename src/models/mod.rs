// Gateway module for models - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod factory;
mod gemini;
mod traits;
mod types;

#[cfg(test)]
pub(crate) mod scripted;

// Public re-exports - the ONLY way to access model functionality
pub use factory::BackendFactory;
pub use gemini::{GeminiBackend, GeminiSession};
pub use traits::{ChatBackend, ModelSession};
pub use types::{GenerationConfig, ModelError, ModelResponse, StreamCallback, TokenUsage};
