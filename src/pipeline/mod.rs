pub mod config;
pub mod error;
pub mod orchestrator;
pub mod writer;
