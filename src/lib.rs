pub mod config;
pub mod constants;
pub mod core;
pub mod errors;
pub mod logging;
pub mod market;
pub mod oracle;
pub mod persistence;
pub mod types;
