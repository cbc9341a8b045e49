pub mod data_path;
pub mod paths;
pub mod redact;
pub mod shell;
