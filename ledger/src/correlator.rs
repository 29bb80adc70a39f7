//! Correlation between outstanding decryption requests and the
//! (survey, item) pair they concern.
//!
//! The oracle callback is a distinct thread of control with unbounded
//! latency; it may arrive at any time after a reveal was requested,
//! twice, or never. Entries are therefore kept after fulfilment,
//! marked applied, so a redelivered request id is recognizable as a
//! benign no-op while an id that was never issued stays a hard error.

use std::collections::{HashMap, HashSet};

use survey_types::{RequestId, SurveyId};

use crate::error::LedgerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingDecryption {
    pub survey_id: SurveyId,
    pub item_index: usize,
    /// Set once the oracle's result has been written to the ledger.
    pub applied: bool,
}

#[derive(Debug, Default)]
pub struct DecryptionCorrelator {
    by_request: HashMap<RequestId, PendingDecryption>,
    /// Items with an unfulfilled request in flight. At most one live
    /// entry per (survey, item).
    in_flight: HashSet<(SurveyId, usize)>,
}

impl DecryptionCorrelator {
    /// Fails if a reveal for this item is already in flight.
    pub fn ensure_idle(&self, survey_id: SurveyId, item_index: usize) -> Result<(), LedgerError> {
        if self.in_flight.contains(&(survey_id, item_index)) {
            return Err(LedgerError::RevealAlreadyPending(survey_id, item_index));
        }
        Ok(())
    }

    pub fn issue(&mut self, request_id: RequestId, survey_id: SurveyId, item_index: usize) {
        self.in_flight.insert((survey_id, item_index));
        let previous = self.by_request.insert(
            request_id,
            PendingDecryption {
                survey_id,
                item_index,
                applied: false,
            },
        );
        debug_assert!(previous.is_none(), "oracle reissued a request id");
    }

    /// Context for a delivered result. `UnknownRequest` covers both
    /// replayed ids the oracle never issued and forged callbacks.
    pub fn lookup(&self, request_id: &RequestId) -> Result<PendingDecryption, LedgerError> {
        self.by_request
            .get(request_id)
            .copied()
            .ok_or(LedgerError::UnknownRequest(*request_id))
    }

    /// Marks a request fulfilled. The entry stays behind so a second
    /// delivery of the same id is detected as already applied.
    pub fn retire(&mut self, request_id: &RequestId) {
        if let Some(pending) = self.by_request.get_mut(request_id) {
            pending.applied = true;
            self.in_flight
                .remove(&(pending.survey_id, pending.item_index));
        }
    }
}
