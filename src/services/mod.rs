pub mod binder;
pub mod coordinator;
pub mod logger;
pub mod secrets;
pub mod security;
