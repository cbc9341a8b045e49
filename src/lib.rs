pub mod app;
pub mod constants;
pub mod errors;
pub mod executors;
pub mod mcp;
pub mod model;
pub mod services;
pub mod stores;
pub mod utils;
