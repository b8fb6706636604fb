//! Resolved signing identities.
//!
//! Key derivation and transaction signing live outside this workspace. A
//! `Signer` is only the resolved public address plus the secret material the
//! signing collaborator needs, which is zeroized on drop and never printed.

use std::fmt;
use std::sync::Arc;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::Address;

/// Secret recovery phrase or seed, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretPhrase(String);

impl SecretPhrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret to a signing collaborator.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretPhrase(<redacted>)")
    }
}

/// A signing identity whose address has been resolved.
#[derive(Debug, Clone)]
pub struct Signer {
    address: Address,
    secret: Arc<SecretPhrase>,
}

impl Signer {
    pub fn new(address: Address, secret: SecretPhrase) -> Self {
        Self {
            address,
            secret: Arc::new(secret),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn secret(&self) -> &SecretPhrase {
        &self.secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let signer = Signer::new(Address::new("GME"), SecretPhrase::new("word word word"));
        let printed = format!("{signer:?}");
        assert!(printed.contains("GME"));
        assert!(!printed.contains("word"));
    }

    #[test]
    fn test_blank_secret_is_empty() {
        assert!(SecretPhrase::new("   ").is_empty());
        assert!(!SecretPhrase::new("abandon").is_empty());
    }
}
