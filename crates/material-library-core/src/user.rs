//! User fingerprints.
//!
//! A user is identified by a short, non-secret fingerprint derived from
//! their LLM API key. It only namespaces the library file name and is not
//! an authentication mechanism.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex characters kept from the credential digest.
pub const FINGERPRINT_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    /// Derive the fingerprint of `credential` (truncated SHA-256, lowercase hex).
    pub fn from_credential(credential: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(credential.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..FINGERPRINT_LEN].to_string())
    }

    /// Use an already-derived fingerprint, e.g. one printed by `matlib whoami`.
    pub fn from_fingerprint(fingerprint: &str) -> Result<Self> {
        let fp = fingerprint.trim();
        if fp.is_empty() {
            bail!("fingerprint must not be empty");
        }
        if !fp.chars().all(|c| c.is_ascii_alphanumeric()) {
            bail!("fingerprint must be ASCII alphanumeric: '{}'", fp);
        }
        Ok(Self(fp.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the library file for this user.
    pub fn file_name(&self) -> String {
        format!("material_lib_{}.csv", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
