//! Key resolution.
//!
//! Turns user-supplied secret material into a [`Signer`]. Real hierarchical
//! derivation belongs to the signing collaborator; the sandbox resolver only
//! needs stable, distinct addresses per phrase.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use claimrace_core::{Address, SecretPhrase, Signer};

use crate::error::{LedgerError, LedgerResult};

/// Minimum number of words in a recovery phrase.
const MIN_PHRASE_WORDS: usize = 12;

/// Resolves secret material into a signing identity.
pub trait KeyResolver: Send + Sync {
    /// Returns `LedgerError::InvalidKey` for malformed material.
    fn resolve(&self, secret: SecretPhrase) -> LedgerResult<Signer>;
}

/// Arc wrapper for KeyResolver trait objects.
pub type DynKeyResolver = Arc<dyn KeyResolver>;

/// Deterministic resolver for the sandbox ledger.
///
/// Accepts phrases of at least twelve lowercase words and maps each phrase
/// to `G` followed by the first 55 uppercase hex digits of its SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxKeyResolver;

impl SandboxKeyResolver {
    /// Address the resolver assigns to `phrase`.
    pub fn address_for(phrase: &str) -> Address {
        let normalized = normalize(phrase);
        let digest = Sha256::digest(normalized.as_bytes());
        let hex = hex::encode_upper(digest);
        Address::new(format!("G{}", &hex[..55]))
    }
}

impl KeyResolver for SandboxKeyResolver {
    fn resolve(&self, secret: SecretPhrase) -> LedgerResult<Signer> {
        let words: Vec<&str> = secret.expose().split_whitespace().collect();
        if words.len() < MIN_PHRASE_WORDS {
            return Err(LedgerError::InvalidKey(format!(
                "expected at least {MIN_PHRASE_WORDS} words, got {}",
                words.len()
            )));
        }
        if !words
            .iter()
            .all(|w| w.chars().all(|c| c.is_ascii_alphabetic()))
        {
            return Err(LedgerError::InvalidKey(
                "phrase must contain only alphabetic words".to_string(),
            ));
        }

        let address = Self::address_for(secret.expose());
        Ok(Signer::new(address, secret))
    }
}

fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
