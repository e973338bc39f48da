//! Application use cases / business logic

pub mod pipeline;
pub mod router;
pub mod scheduler;

pub use pipeline::{
    IngestOutcome, Pipeline, PipelineConfig, PipelineError, PublishOutcome, StatusSnapshot,
    WeeklyCaps,
};
pub use router::{CandidateFailure, Pricing, ProviderRouter, RouterConfig, RouterExhausted};
