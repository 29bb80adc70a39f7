//! Boundary to the external homomorphic encryption capability.

use survey_types::{CiphertextHandle, Identity, RequestId};

use crate::error::ProviderError;

/// The capability the ledger consumes. Ratings are encrypted
/// client-side; the ledger only ever moves opaque handles around and
/// never observes a plaintext.
pub trait EncryptionProvider {
    /// Converts an opaque client-side ciphertext plus validity proof
    /// into an internal handle. A failed proof rejects with
    /// [`ProviderError::InvalidProof`].
    fn from_opaque_input(
        &mut self,
        ciphertext: &[u8],
        proof: &[u8],
    ) -> Result<CiphertextHandle, ProviderError>;

    /// Homomorphic addition: the returned handle decrypts to the sum
    /// of the operands' plaintexts.
    fn add(
        &mut self,
        a: CiphertextHandle,
        b: CiphertextHandle,
    ) -> Result<CiphertextHandle, ProviderError>;

    /// Extends decryption rights on `handle` to `who`.
    fn authorize(&mut self, handle: CiphertextHandle, who: &Identity)
        -> Result<(), ProviderError>;

    /// Asks the decryption oracle to open `handle`. The request id is
    /// issued by the oracle side and cannot be guessed by other
    /// callers; the plaintext is delivered asynchronously through
    /// `SurveyLedger::apply_result`, possibly never.
    fn request_decryption(&mut self, handle: CiphertextHandle)
        -> Result<RequestId, ProviderError>;
}
