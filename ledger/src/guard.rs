//! Duplicate-submission tracking.

use std::collections::HashSet;

use survey_types::{Identity, SurveyId};

use crate::error::LedgerError;

/// Records which identities have already contributed to which survey.
/// Records are permanent; a submission is never reversed.
///
/// The check/commit split exists so a failed accumulation (bad proof,
/// arity mismatch) leaves no trace here: the record is only committed
/// after every item of the submission has accumulated successfully.
#[derive(Debug, Default)]
pub struct SubmissionGuard {
    records: HashSet<(SurveyId, Identity)>,
}

impl SubmissionGuard {
    pub fn check(&self, survey_id: SurveyId, respondent: &Identity) -> Result<(), LedgerError> {
        if self.has_submitted(survey_id, respondent) {
            return Err(LedgerError::DuplicateSubmission(survey_id));
        }
        Ok(())
    }

    pub fn commit(&mut self, survey_id: SurveyId, respondent: &Identity) {
        let fresh = self.records.insert((survey_id, respondent.clone()));
        debug_assert!(fresh, "submission committed twice for one respondent");
    }

    pub fn has_submitted(&self, survey_id: SurveyId, respondent: &Identity) -> bool {
        self.records.contains(&(survey_id, respondent.clone()))
    }

    /// Number of recorded submissions for one survey. The ledger keeps
    /// a per-survey counter in lockstep with this.
    pub fn count_for(&self, survey_id: SurveyId) -> u64 {
        self.records.iter().filter(|(id, _)| *id == survey_id).count() as u64
    }
}
