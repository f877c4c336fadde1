use std::collections::HashMap;

use rsa::RsaPublicKey;

use crate::error::{PaySignError, Result};

/// Gateway public keys indexed by certificate serial identifier.
///
/// Populated while a client is being built, then shared behind an `Arc`
/// and only read. Always holds an entry for its default serial, which is
/// what an empty serial resolves to.
#[derive(Debug, Clone)]
pub struct PublicKeyRegistry {
    keys: HashMap<String, RsaPublicKey>,
    default_serial: String,
}

impl PublicKeyRegistry {
    pub fn new(default_serial: impl Into<String>, default_key: RsaPublicKey) -> Self {
        let default_serial = default_serial.into();
        let mut keys = HashMap::new();
        keys.insert(default_serial.clone(), default_key);
        Self {
            keys,
            default_serial,
        }
    }

    /// Adds or replaces the key for `serial`.
    pub fn register(&mut self, serial: impl Into<String>, key: RsaPublicKey) {
        let serial = serial.into();
        tracing::debug!(%serial, "registering gateway public key");
        self.keys.insert(serial, key);
    }

    /// Makes an already registered serial the default.
    pub fn set_default(&mut self, serial: &str) -> Result<()> {
        if !self.keys.contains_key(serial) {
            return Err(PaySignError::KeyNotFound(serial.to_owned()));
        }
        self.default_serial = serial.to_owned();
        Ok(())
    }

    pub fn default_serial(&self) -> &str {
        &self.default_serial
    }

    /// Resolves `serial` (empty means the default) to its public key.
    pub fn lookup(&self, serial: &str) -> Result<&RsaPublicKey> {
        let serial = if serial.is_empty() {
            self.default_serial.as_str()
        } else {
            serial
        };
        self.keys
            .get(serial)
            .ok_or_else(|| PaySignError::KeyNotFound(serial.to_owned()))
    }

    pub fn contains(&self, serial: &str) -> bool {
        self.keys.contains_key(serial)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
