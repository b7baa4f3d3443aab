//! AI summary generation for submitted intakes.

pub mod orchestrator;
pub mod prompt;
pub mod provider;

pub use orchestrator::{StreamEvent, SummaryError, SummaryOrchestrator};
pub use provider::{
    ChunkStream, GenerationOutput, GenerationRequest, GenerativeProvider, MockProvider,
    OllamaProvider, ProviderError, StreamChunk,
};
