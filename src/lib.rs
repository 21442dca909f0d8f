pub mod audit;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod pipeline_config;
pub mod processor;
pub mod stage;
pub mod ui;
