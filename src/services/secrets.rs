use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::services::security::Security;
use crate::stores::SecretStore;
use serde_json::json;
use std::sync::Arc;

/// Named secret vault. Values go in encrypted and come back out only
/// through [`resolve`](Self::resolve), which callers use as a probe:
/// any string might be a secret name, a miss just means "use the string
/// as-is".
pub struct SecretService {
    logger: Logger,
    store: Arc<SecretStore>,
    security: Arc<Security>,
}

impl SecretService {
    pub fn new(logger: &Logger, store: Arc<SecretStore>, security: Arc<Security>) -> Self {
        Self {
            logger: logger.child("secrets"),
            store,
            security,
        }
    }

    pub fn store(&self, key: &str, value: &str) -> Result<(), ToolError> {
        let ciphertext = self.security.encrypt(value)?;
        self.store.put(key, &ciphertext)?;
        self.logger
            .debug("Secret stored", Some(&json!({ "key": key })));
        Ok(())
    }

    /// Looks `candidate` up as a secret name. Returns the decrypted
    /// value on a hit, `None` on a miss or when the stored payload can
    /// no longer be decrypted (logged, so a rotated key is noticed).
    pub fn resolve(&self, candidate: &str) -> Option<String> {
        let ciphertext = match self.store.get(candidate) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(err) => {
                self.logger.warn(
                    "Secret lookup failed",
                    Some(&json!({ "key": candidate, "error": err.to_string() })),
                );
                return None;
            }
        };
        match self.security.decrypt(&ciphertext) {
            Ok(plaintext) => Some(plaintext),
            Err(err) => {
                self.logger.warn(
                    "Secret could not be decrypted",
                    Some(&json!({ "key": candidate, "error": err.to_string() })),
                );
                None
            }
        }
    }

    /// Resolves a value that may be a secret reference, falling back to
    /// the literal text.
    pub fn resolve_or_literal(&self, value: &str) -> String {
        self.resolve(value).unwrap_or_else(|| value.to_string())
    }

    /// True when `value` names a stored secret.
    pub fn is_reference(&self, value: &str) -> bool {
        matches!(self.store.get(value), Ok(Some(_)))
    }

    pub fn delete(&self, key: &str) -> Result<bool, ToolError> {
        let existed = self.store.delete(key)?;
        if existed {
            self.logger
                .debug("Secret deleted", Some(&json!({ "key": key })));
        }
        Ok(existed)
    }

    pub fn list(&self) -> Result<Vec<String>, ToolError> {
        self.store.list()
    }

    pub fn encryption_available(&self) -> bool {
        self.security.encryption_available()
    }
}
