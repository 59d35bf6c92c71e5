pub mod builder;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod metrics;
pub mod order;
pub mod outcome;
pub mod pacing;
pub mod percentiles;
pub mod sink;
pub mod unit;
pub mod utils;
pub mod yaml_config;
