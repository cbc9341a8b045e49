use std::path::PathBuf;

pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TOOLBENCH_DATA_DIR") {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".toolbench");
    }
    std::env::temp_dir().join("toolbench")
}

pub fn resolve_db_path() -> PathBuf {
    resolve_data_dir().join("toolbench.db")
}

pub fn resolve_secret_key_path() -> PathBuf {
    resolve_data_dir().join("secret.key")
}
