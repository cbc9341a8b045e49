pub mod network {
    pub const TIMEOUT_HTTP_REQUEST_MS: u64 = 5_000;
    pub const TIMEOUT_CLI_EXEC_MS: u64 = 30_000;
}

pub mod buffers {
    pub const MAX_CLI_OUTPUT_BYTES: usize = 10 * 1024 * 1024;
    pub const MAX_HTTP_BODY_BYTES: usize = 10 * 1024 * 1024;
    pub const READ_CHUNK_BYTES: usize = 8 * 1024;
    pub const CRYPTO_KEY_SIZE: usize = 32;
    pub const CRYPTO_IV_SIZE: usize = 12;
    pub const CRYPTO_TAG_SIZE: usize = 16;
}

pub mod limits {
    pub const LOG_RETENTION: usize = 1_000;
}
