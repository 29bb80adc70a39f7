//! Encrypted survey ledger.
//!
//! Anonymous respondents rate competing items on a bounded scale.
//! Every individual rating stays encrypted end to end; the ledger only
//! ever holds opaque ciphertext handles, homomorphically accumulated
//! per item, and the sole plaintext that ever appears is the per-item
//! aggregate sum, delivered after the survey ends by an external
//! asynchronous decryption oracle, exactly once.

pub mod accumulator;
pub mod correlator;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod lifecycle;
pub mod mock;
pub mod provider;

pub use error::{LedgerError, ProviderError};
pub use ledger::{ApplyOutcome, Survey, SurveyLedger};
pub use lifecycle::SurveyState;
pub use provider::EncryptionProvider;
