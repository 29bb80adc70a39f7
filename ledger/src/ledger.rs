//! The survey ledger: the shared store owning every survey, the
//! submission records, and the outstanding decryption requests.
//!
//! All mutations go through `&mut self` methods, which is the whole
//! concurrency model: operations are atomic, serialized transactions
//! that either complete or fail fast without partial effects. Callers
//! that need cross-thread access put the ledger behind a mutex; the
//! oracle callback then arrives through `apply_result` as its own
//! serialized transaction, whenever (and if ever) it comes.

use tracing::{debug, info};

use survey_types::{
    CiphertextHandle, Identity, RequestId, SurveyEvent, SurveyId, Timestamp, MAX_ITEMS, MIN_ITEMS,
    PLAINTEXT_WIDTH,
};

use crate::accumulator::HomomorphicAccumulator;
use crate::correlator::DecryptionCorrelator;
use crate::error::{LedgerError, ProviderError};
use crate::guard::SubmissionGuard;
use crate::lifecycle::{self, SurveyState};
use crate::provider::EncryptionProvider;

/// One survey and everything it owns.
#[derive(Debug)]
pub struct Survey {
    pub id: SurveyId,
    pub title: String,
    pub description: String,
    pub item_names: Vec<String>,
    pub deadline: Timestamp,
    pub open: bool,
    pub finalized: bool,
    pub admin: Identity,
    pub response_count: u64,
    /// Running encrypted sum per item; absent until the first
    /// submission seeds it.
    encrypted_sums: Vec<Option<CiphertextHandle>>,
    /// Revealed plaintext sum per item. An explicit presence flag, so
    /// a true sum of zero is distinguishable from "not revealed".
    decrypted_sums: Vec<Option<u64>>,
}

impl Survey {
    pub fn state(&self) -> SurveyState {
        if self.finalized {
            SurveyState::Finalized
        } else if self.open {
            SurveyState::Open
        } else {
            SurveyState::Ended
        }
    }

    pub fn item_count(&self) -> usize {
        self.item_names.len()
    }

    pub fn encrypted_sum(&self, item_index: usize) -> Option<CiphertextHandle> {
        self.encrypted_sums.get(item_index).copied().flatten()
    }

    pub fn decrypted_sum(&self, item_index: usize) -> Option<u64> {
        self.decrypted_sums.get(item_index).copied().flatten()
    }

    pub fn all_revealed(&self) -> bool {
        self.decrypted_sums.iter().all(Option::is_some)
    }

    fn check_index(&self, item_index: usize) -> Result<(), LedgerError> {
        if item_index >= self.item_count() {
            return Err(LedgerError::InvalidItemIndex {
                index: item_index,
                count: self.item_count(),
            });
        }
        Ok(())
    }
}

/// Outcome of delivering an oracle result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied {
        survey_id: SurveyId,
        item_index: usize,
        sum: u64,
    },
    /// The result had already been written; redelivery is benign and
    /// never overwrites a published sum.
    AlreadyApplied,
}

pub struct SurveyLedger<P: EncryptionProvider> {
    provider: P,
    accumulator: HomomorphicAccumulator,
    guard: SubmissionGuard,
    correlator: DecryptionCorrelator,
    surveys: Vec<Survey>,
    events: Vec<SurveyEvent>,
}

impl<P: EncryptionProvider> SurveyLedger<P> {
    /// `identity` is the principal the ledger itself acts under when
    /// extending decryption authorization to itself.
    pub fn new(provider: P, identity: Identity) -> Self {
        SurveyLedger {
            provider,
            accumulator: HomomorphicAccumulator::new(identity),
            guard: SubmissionGuard::default(),
            correlator: DecryptionCorrelator::default(),
            surveys: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn create_survey(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        item_names: Vec<String>,
        duration_secs: u64,
        admin: Identity,
        now: Timestamp,
    ) -> Result<SurveyId, LedgerError> {
        if !(MIN_ITEMS..=MAX_ITEMS).contains(&item_names.len()) {
            return Err(LedgerError::InvalidItemCount(item_names.len()));
        }
        let id = self.surveys.len() as SurveyId;
        let deadline = now + duration_secs;
        let item_count = item_names.len();
        self.surveys.push(Survey {
            id,
            title: title.into(),
            description: description.into(),
            item_names,
            deadline,
            open: true,
            finalized: false,
            admin: admin.clone(),
            response_count: 0,
            encrypted_sums: vec![None; item_count],
            decrypted_sums: vec![None; item_count],
        });
        info!(survey_id = id, deadline, "survey created");
        self.events.push(SurveyEvent::SurveyCreated {
            survey_id: id,
            admin,
            deadline,
        });
        Ok(id)
    }

    /// Accepts one rating per item from `respondent`, all-or-nothing.
    /// The guard record is only committed after every item has
    /// accumulated, so a rejected proof or arity mismatch leaves the
    /// respondent free to submit again.
    pub fn submit_ratings(
        &mut self,
        survey_id: SurveyId,
        respondent: &Identity,
        ciphertexts: &[Vec<u8>],
        proofs: &[Vec<u8>],
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        let pos = self.index_of(survey_id)?;
        lifecycle::check_accepting(&self.surveys[pos], now)?;

        let expected = self.surveys[pos].item_count();
        if ciphertexts.len() != expected {
            return Err(LedgerError::ArityMismatch {
                expected,
                got: ciphertexts.len(),
            });
        }
        if proofs.len() != expected {
            return Err(LedgerError::ArityMismatch {
                expected,
                got: proofs.len(),
            });
        }
        self.guard.check(survey_id, respondent)?;

        // Verify every opaque input before touching anything else.
        let mut incoming = Vec::with_capacity(expected);
        for (item_index, (ciphertext, proof)) in ciphertexts.iter().zip(proofs).enumerate() {
            let handle = self
                .provider
                .from_opaque_input(ciphertext, proof)
                .map_err(|err| match err {
                    ProviderError::InvalidProof => {
                        LedgerError::InvalidCiphertextProof { item_index }
                    }
                    other => LedgerError::Provider(other),
                })?;
            incoming.push(handle);
        }

        // Stage all new sums, then commit them in one step so a
        // provider failure cannot leave a partial update behind.
        let admin = self.surveys[pos].admin.clone();
        let mut new_sums = Vec::with_capacity(expected);
        for (item_index, handle) in incoming.into_iter().enumerate() {
            let current = self.surveys[pos].encrypted_sums[item_index];
            let sum = self
                .accumulator
                .accumulate(&mut self.provider, current, handle, &admin)?;
            new_sums.push(sum);
        }

        let survey = &mut self.surveys[pos];
        for (item_index, sum) in new_sums.into_iter().enumerate() {
            survey.encrypted_sums[item_index] = Some(sum);
        }
        survey.response_count += 1;
        self.guard.commit(survey_id, respondent);
        debug!(survey_id, respondent = %respondent, "ratings accumulated");
        self.events.push(SurveyEvent::RatingSubmitted {
            survey_id,
            respondent: respondent.clone(),
        });
        Ok(())
    }

    /// Open → Ended. Anyone may drive this once the deadline passed.
    pub fn end_survey(&mut self, survey_id: SurveyId, now: Timestamp) -> Result<(), LedgerError> {
        let pos = self.index_of(survey_id)?;
        lifecycle::check_end(&self.surveys[pos], now)?;
        self.surveys[pos].open = false;
        info!(survey_id, "survey ended");
        self.events.push(SurveyEvent::SurveyEnded { survey_id });
        Ok(())
    }

    /// Asks the oracle to decrypt one item's accumulated sum. At most
    /// one request may be in flight per item, and none once the item
    /// is revealed.
    pub fn request_reveal(
        &mut self,
        survey_id: SurveyId,
        item_index: usize,
    ) -> Result<RequestId, LedgerError> {
        let pos = self.index_of(survey_id)?;
        let survey = &self.surveys[pos];
        survey.check_index(item_index)?;
        if survey.state() == SurveyState::Open {
            return Err(LedgerError::SurveyStillOpen(survey_id));
        }
        if survey.decrypted_sum(item_index).is_some() {
            return Err(LedgerError::ItemAlreadyRevealed(survey_id, item_index));
        }
        self.correlator.ensure_idle(survey_id, item_index)?;
        let sum = survey
            .encrypted_sum(item_index)
            .ok_or(LedgerError::NothingToReveal(survey_id, item_index))?;

        let request_id = self.accumulator.request_reveal(&mut self.provider, sum)?;
        self.correlator.issue(request_id, survey_id, item_index);
        info!(survey_id, item_index, %request_id, "reveal requested");
        self.events.push(SurveyEvent::RevealRequested {
            survey_id,
            item_index,
            request_id,
        });
        Ok(request_id)
    }

    /// Oracle callback. Writes the decrypted sum exactly once; a
    /// redelivered or already-written result is a no-op, an id the
    /// oracle never issued is a hard failure. A payload that is too
    /// short leaves the request pending so the oracle can redeliver.
    pub fn apply_result(
        &mut self,
        request_id: RequestId,
        plaintext: &[u8],
    ) -> Result<ApplyOutcome, LedgerError> {
        let pending = self.correlator.lookup(&request_id)?;
        if pending.applied {
            debug!(%request_id, "result redelivered, ignoring");
            return Ok(ApplyOutcome::AlreadyApplied);
        }
        if plaintext.len() < PLAINTEXT_WIDTH {
            return Err(LedgerError::MalformedPlaintext {
                expected: PLAINTEXT_WIDTH,
                got: plaintext.len(),
            });
        }
        let mut buf = [0u8; PLAINTEXT_WIDTH];
        buf.copy_from_slice(&plaintext[..PLAINTEXT_WIDTH]);
        let sum = u64::from_le_bytes(buf);

        let pos = self.index_of(pending.survey_id)?;
        let survey = &mut self.surveys[pos];
        // A pathological double delivery must never overwrite a
        // published sum or write while the survey is open.
        if survey.open || survey.decrypted_sum(pending.item_index).is_some() {
            self.correlator.retire(&request_id);
            return Ok(ApplyOutcome::AlreadyApplied);
        }
        survey.decrypted_sums[pending.item_index] = Some(sum);
        self.correlator.retire(&request_id);
        info!(
            survey_id = pending.survey_id,
            item_index = pending.item_index,
            sum,
            "item revealed"
        );
        self.events.push(SurveyEvent::ItemRevealed {
            survey_id: pending.survey_id,
            item_index: pending.item_index,
            sum,
        });
        Ok(ApplyOutcome::Applied {
            survey_id: pending.survey_id,
            item_index: pending.item_index,
            sum,
        })
    }

    /// Ended → Finalized. Admin only, all items revealed. Terminal.
    pub fn finalize(&mut self, survey_id: SurveyId, caller: &Identity) -> Result<(), LedgerError> {
        let pos = self.index_of(survey_id)?;
        lifecycle::check_finalize(&self.surveys[pos], caller)?;
        self.surveys[pos].finalized = true;
        info!(survey_id, "survey finalized");
        Ok(())
    }

    pub fn survey(&self, survey_id: SurveyId) -> Result<&Survey, LedgerError> {
        let pos = self.index_of(survey_id)?;
        Ok(&self.surveys[pos])
    }

    pub fn encrypted_sum(
        &self,
        survey_id: SurveyId,
        item_index: usize,
    ) -> Result<Option<CiphertextHandle>, LedgerError> {
        let survey = self.survey(survey_id)?;
        survey.check_index(item_index)?;
        Ok(survey.encrypted_sum(item_index))
    }

    pub fn decrypted_sum(
        &self,
        survey_id: SurveyId,
        item_index: usize,
    ) -> Result<u64, LedgerError> {
        let survey = self.survey(survey_id)?;
        survey.check_index(item_index)?;
        survey
            .decrypted_sum(item_index)
            .ok_or(LedgerError::NotRevealed(survey_id, item_index))
    }

    pub fn survey_count(&self) -> u64 {
        self.surveys.len() as u64
    }

    pub fn has_submitted(&self, survey_id: SurveyId, respondent: &Identity) -> bool {
        self.guard.has_submitted(survey_id, respondent)
    }

    /// Number of guard records for one survey; always equals the
    /// survey's response counter.
    pub fn submission_count(&self, survey_id: SurveyId) -> u64 {
        self.guard.count_for(survey_id)
    }

    /// Hands out the notifications accumulated since the last drain.
    pub fn drain_events(&mut self) -> Vec<SurveyEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    fn index_of(&self, survey_id: SurveyId) -> Result<usize, LedgerError> {
        let pos = survey_id as usize;
        if pos >= self.surveys.len() {
            return Err(LedgerError::UnknownSurvey(survey_id));
        }
        Ok(pos)
    }
}
