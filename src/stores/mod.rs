pub mod descriptors;
pub mod logs;
pub mod secrets;

pub use descriptors::DescriptorStore;
pub use logs::{LogStats, LogStore};
pub use secrets::SecretStore;
