pub mod adapt_config;
pub mod boundary;
pub mod config;
pub mod context;
pub mod dataset;
pub mod driver;
pub mod errors;
pub mod logging;
pub mod orchestrator;
pub mod phase;
pub mod report;
pub mod ui;
