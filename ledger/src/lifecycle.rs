//! The survey lifecycle state machine: Open → Ended → Finalized.
//!
//! The state is derived from the `open`/`finalized` flags a survey
//! carries; these checks are the only place transition rules live, so
//! the ledger operations cannot disagree about them.

use survey_types::{Identity, Timestamp};

use crate::error::LedgerError;
use crate::ledger::Survey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurveyState {
    Open,
    Ended,
    /// Terminal. No transition leaves it.
    Finalized,
}

/// A rating is accepted only while the survey is `Open` *and* the
/// deadline has not passed. Both are checked at submission time, so a
/// deadline that expired before anyone called `end_survey` still
/// rejects late submissions.
pub(crate) fn check_accepting(survey: &Survey, now: Timestamp) -> Result<(), LedgerError> {
    if survey.state() != SurveyState::Open || now >= survey.deadline {
        return Err(LedgerError::SurveyNotOpen(survey.id));
    }
    Ok(())
}

/// Open → Ended. Permissionless, but only once the deadline passed.
pub(crate) fn check_end(survey: &Survey, now: Timestamp) -> Result<(), LedgerError> {
    if survey.state() != SurveyState::Open {
        return Err(LedgerError::AlreadyEnded(survey.id));
    }
    if now < survey.deadline {
        return Err(LedgerError::NotYetExpired(survey.id));
    }
    Ok(())
}

/// Ended → Finalized. Admin only, and only with every item revealed.
pub(crate) fn check_finalize(survey: &Survey, caller: &Identity) -> Result<(), LedgerError> {
    if survey.state() == SurveyState::Finalized {
        return Err(LedgerError::AlreadyFinalized(survey.id));
    }
    if caller != &survey.admin {
        return Err(LedgerError::NotAdmin);
    }
    if !survey.all_revealed() {
        return Err(LedgerError::IncompleteReveal(survey.id));
    }
    Ok(())
}
