//! Homomorphic accumulation on top of the external encryption
//! capability.

use survey_types::{CiphertextHandle, Identity, RequestId};

use crate::error::ProviderError;
use crate::provider::EncryptionProvider;

/// Folds incoming ciphertexts into per-item running sums and keeps the
/// resulting handles decryptable by the right principals. Stateless
/// apart from knowing which identity the ledger itself acts under.
#[derive(Debug)]
pub struct HomomorphicAccumulator {
    identity: Identity,
}

impl HomomorphicAccumulator {
    pub fn new(identity: Identity) -> Self {
        HomomorphicAccumulator { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Combines `incoming` into the running sum for one item. The
    /// first ciphertext seeds the sum directly; there is no encrypted
    /// zero bootstrap value. The new sum is re-authorized to the
    /// ledger (so a reveal can be requested later) and to the survey
    /// admin (who may decrypt directly if the provider supports it).
    pub fn accumulate<P: EncryptionProvider>(
        &self,
        provider: &mut P,
        current: Option<CiphertextHandle>,
        incoming: CiphertextHandle,
        admin: &Identity,
    ) -> Result<CiphertextHandle, ProviderError> {
        let sum = match current {
            None => incoming,
            Some(existing) => provider.add(existing, incoming)?,
        };
        provider.authorize(sum, &self.identity)?;
        provider.authorize(sum, admin)?;
        Ok(sum)
    }

    /// Hands the item's current sum to the oracle for asynchronous
    /// decryption. The plaintext arrives later (or never) through the
    /// ledger's `apply_result`.
    pub fn request_reveal<P: EncryptionProvider>(
        &self,
        provider: &mut P,
        sum: CiphertextHandle,
    ) -> Result<RequestId, ProviderError> {
        provider.request_decryption(sum)
    }
}
