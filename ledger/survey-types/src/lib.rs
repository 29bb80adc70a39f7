//! Identifier, token, and event types shared between the survey ledger
//! core and the applications driving it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonically assigned survey identifier, starting at 0.
pub type SurveyId = u64;

/// Seconds since the unix epoch.
pub type Timestamp = u64;

/// Bounds on how many items a survey may carry.
pub const MIN_ITEMS: usize = 2;
pub const MAX_ITEMS: usize = 5;

/// Width in bytes of a decrypted sum on the oracle callback wire.
pub const PLAINTEXT_WIDTH: usize = 8;

/// Opaque comparable token identifying a principal: a respondent, a
/// survey admin, or the ledger itself. Used solely for duplicate
/// prevention and decryption authorization, never interpreted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(token: impl Into<String>) -> Self {
        Identity(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(token: &str) -> Self {
        Identity(token.to_owned())
    }
}

/// Handle to a ciphertext held by the encryption provider. Only the
/// provider can resolve it; the ledger never sees plaintext through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CiphertextHandle(pub u64);

/// Identifier issued by the decryption oracle for one outstanding
/// request. 32 bytes so the namespace cannot be guessed by callers
/// other than the oracle integration point.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub [u8; 32]);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = hex::encode(self.0);
        write!(f, "RequestId({}..)", &full[..8])
    }
}

/// Notifications for external subscribers. Not required for
/// correctness; the ledger stays consistent whether or not anyone
/// drains them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurveyEvent {
    SurveyCreated {
        survey_id: SurveyId,
        admin: Identity,
        deadline: Timestamp,
    },
    RatingSubmitted {
        survey_id: SurveyId,
        respondent: Identity,
    },
    SurveyEnded {
        survey_id: SurveyId,
    },
    RevealRequested {
        survey_id: SurveyId,
        item_index: usize,
        request_id: RequestId,
    },
    ItemRevealed {
        survey_id: SurveyId,
        item_index: usize,
        sum: u64,
    },
}
