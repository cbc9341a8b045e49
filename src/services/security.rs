use crate::constants::buffers::{CRYPTO_IV_SIZE, CRYPTO_KEY_SIZE, CRYPTO_TAG_SIZE};
use crate::errors::ToolError;
use crate::utils::paths::resolve_secret_key_path;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use base64::Engine;
use rand::RngCore;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Payloads written without a usable cipher carry this marker so the
/// degraded mode stays visible to operators.
const PLAIN_PREFIX: &str = "plain:";

fn decode_key(raw: &str) -> Option<Vec<u8>> {
    let trimmed = raw.trim();
    if trimmed.len() == CRYPTO_KEY_SIZE * 2 {
        return hex::decode(trimmed).ok().filter(|k| k.len() == CRYPTO_KEY_SIZE);
    }
    if trimmed.len() == CRYPTO_KEY_SIZE {
        return Some(trimmed.as_bytes().to_vec());
    }
    if trimmed.len() > CRYPTO_KEY_SIZE * 2 {
        let engine = base64::engine::general_purpose::STANDARD;
        return engine
            .decode(trimmed.as_bytes())
            .ok()
            .filter(|k| k.len() == CRYPTO_KEY_SIZE);
    }
    None
}

/// Reversible secret encryption. AES-256-GCM with a persisted key when
/// one can be loaded or created; otherwise a clearly marked base64
/// obfuscation that still round-trips.
#[derive(Clone)]
pub struct Security {
    cipher: Option<Aes256Gcm>,
}

impl Security {
    pub fn new() -> Self {
        Self::with_key_file(&resolve_secret_key_path())
    }

    pub fn with_key_file(path: &Path) -> Self {
        let cipher = Self::load_or_create_key(&path.to_path_buf()).map(|key| {
            let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&key);
            Aes256Gcm::new(key)
        });
        Self { cipher }
    }

    /// Forced degraded mode, for tests and for platforms where no key
    /// can be persisted.
    pub fn degraded() -> Self {
        Self { cipher: None }
    }

    pub fn encryption_available(&self) -> bool {
        self.cipher.is_some()
    }

    fn load_or_create_key(path: &PathBuf) -> Option<Vec<u8>> {
        if let Ok(raw) = std::env::var("TOOLBENCH_ENCRYPTION_KEY") {
            if let Some(decoded) = decode_key(&raw) {
                return Some(decoded);
            }
        }

        if path.exists() {
            if let Ok(stored) = fs::read_to_string(path) {
                if let Some(decoded) = decode_key(&stored) {
                    return Some(decoded);
                }
            }
        }

        let mut generated = vec![0u8; CRYPTO_KEY_SIZE];
        OsRng.fill_bytes(&mut generated);
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path);
        match file {
            Ok(mut file) => {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
                }
                if file.write_all(hex::encode(&generated).as_bytes()).is_err() {
                    return None;
                }
                Some(generated)
            }
            // Key cannot be persisted: degrade rather than fail.
            Err(_) => None,
        }
    }

    pub fn encrypt(&self, text: &str) -> Result<String, ToolError> {
        let Some(cipher) = &self.cipher else {
            let engine = base64::engine::general_purpose::STANDARD;
            return Ok(format!("{}{}", PLAIN_PREFIX, engine.encode(text.as_bytes())));
        };
        let mut iv = [0u8; CRYPTO_IV_SIZE];
        OsRng.fill_bytes(&mut iv);
        let nonce = aes_gcm::Nonce::from_slice(&iv);
        let mut ciphertext = cipher
            .encrypt(nonce, text.as_bytes())
            .map_err(|_| ToolError::internal("Failed to encrypt secret payload"))?;
        if ciphertext.len() < CRYPTO_TAG_SIZE {
            return Err(ToolError::internal("Failed to encrypt secret payload"));
        }
        let tag = ciphertext.split_off(ciphertext.len() - CRYPTO_TAG_SIZE);
        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    pub fn decrypt(&self, payload: &str) -> Result<String, ToolError> {
        if let Some(encoded) = payload.strip_prefix(PLAIN_PREFIX) {
            let engine = base64::engine::general_purpose::STANDARD;
            let decoded = engine
                .decode(encoded.as_bytes())
                .map_err(|_| ToolError::invalid_params("Invalid obfuscated payload"))?;
            return Ok(String::from_utf8_lossy(&decoded).to_string());
        }
        let Some(cipher) = &self.cipher else {
            return Err(ToolError::internal(
                "Encrypted payload found but no encryption key is available",
            )
            .with_hint("Restore the key file or TOOLBENCH_ENCRYPTION_KEY, then retry."));
        };
        let parts: Vec<&str> = payload.split(':').collect();
        if parts.len() != 3 {
            return Err(ToolError::invalid_params("Invalid encrypted payload format")
                .with_hint("Expected format: \"<iv_hex>:<tag_hex>:<data_hex>\"."));
        }
        let iv = hex::decode(parts[0])
            .map_err(|_| ToolError::invalid_params("Invalid encrypted payload format"))?;
        let tag = hex::decode(parts[1])
            .map_err(|_| ToolError::invalid_params("Invalid encrypted payload format"))?;
        let data = hex::decode(parts[2])
            .map_err(|_| ToolError::invalid_params("Invalid encrypted payload format"))?;
        if iv.len() != CRYPTO_IV_SIZE {
            return Err(ToolError::invalid_params("Invalid IV length"));
        }
        if tag.len() != CRYPTO_TAG_SIZE {
            return Err(ToolError::invalid_params("Invalid auth tag length"));
        }
        let mut combined = Vec::with_capacity(data.len() + tag.len());
        combined.extend_from_slice(&data);
        combined.extend_from_slice(&tag);
        let nonce = aes_gcm::Nonce::from_slice(&iv);
        let decrypted = cipher.decrypt(nonce, combined.as_ref()).map_err(|_| {
            ToolError::internal("Failed to decrypt secret payload").with_hint(
                "Ensure the key file (or TOOLBENCH_ENCRYPTION_KEY) matches the one used when the secret was stored.",
            )
        })?;
        Ok(String::from_utf8_lossy(&decrypted).to_string())
    }
}
