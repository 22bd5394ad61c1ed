pub mod bundle;
pub mod error;
pub mod events;
pub mod extractor;
pub mod fetcher;
pub mod orchestrator;
