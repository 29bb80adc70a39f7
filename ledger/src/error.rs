use survey_types::{RequestId, SurveyId};
use thiserror::Error;

/// Failures surfaced by the external encryption capability.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("ciphertext validity proof rejected")]
    InvalidProof,
    #[error("unknown ciphertext handle")]
    UnknownHandle,
    #[error("identity is not authorized to decrypt this ciphertext")]
    NotAuthorized,
}

/// Everything a ledger operation can fail with. Every failure is
/// scoped to the operation that raised it; none of these leave partial
/// state behind.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    // Validation
    #[error("unknown survey {0}")]
    UnknownSurvey(SurveyId),
    #[error("survey must carry between 2 and 5 items, got {0}")]
    InvalidItemCount(usize),
    #[error("item index {index} out of range for a survey with {count} items")]
    InvalidItemIndex { index: usize, count: usize },
    #[error("expected {expected} ciphertexts and proofs, got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("decryption payload too short: expected {expected} bytes, got {got}")]
    MalformedPlaintext { expected: usize, got: usize },

    // Authorization
    #[error("caller is not the survey admin")]
    NotAdmin,
    #[error("deadline of survey {0} has not passed yet")]
    NotYetExpired(SurveyId),

    // State conflicts
    #[error("identity has already submitted to survey {0}")]
    DuplicateSubmission(SurveyId),
    #[error("survey {0} is not open for submissions")]
    SurveyNotOpen(SurveyId),
    #[error("survey {0} has already ended")]
    AlreadyEnded(SurveyId),
    #[error("survey {0} is still open")]
    SurveyStillOpen(SurveyId),
    #[error("item {1} of survey {0} is already revealed")]
    ItemAlreadyRevealed(SurveyId, usize),
    #[error("a reveal for item {1} of survey {0} is already pending")]
    RevealAlreadyPending(SurveyId, usize),
    #[error("survey {0} is already finalized")]
    AlreadyFinalized(SurveyId),
    #[error("survey {0} still has unrevealed items")]
    IncompleteReveal(SurveyId),
    #[error("item {1} of survey {0} has no submissions to reveal")]
    NothingToReveal(SurveyId, usize),
    #[error("item {1} of survey {0} is not revealed")]
    NotRevealed(SurveyId, usize),

    // External dependency
    #[error("validity proof for item {item_index} rejected")]
    InvalidCiphertextProof { item_index: usize },
    #[error("encryption provider failure: {0}")]
    Provider(#[from] ProviderError),

    // Correlator anomalies
    #[error("no decryption was requested under {0}")]
    UnknownRequest(RequestId),
}
