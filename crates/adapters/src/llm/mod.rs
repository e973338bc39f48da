//! LLM provider adapters
//!
//! Each adapter implements the `TextGenerator` port for one backend. The
//! model is chosen per call by the router; adapters own their HTTP client and
//! its bounded timeout.

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod stub;

pub use anthropic::AnthropicGenerator;
pub use gemini::GeminiGenerator;
pub use openai::OpenAiGenerator;
pub use stub::StubGenerator;
