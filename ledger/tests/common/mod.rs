#![allow(dead_code)]

use survey_ledger::mock::{MockProvider, PaillierKeypair};
use survey_ledger::SurveyLedger;
use survey_types::{Identity, SurveyId, Timestamp};

pub const T0: Timestamp = 1_000;
pub const DAY: u64 = 86_400;

pub fn new_ledger() -> (SurveyLedger<MockProvider>, PaillierKeypair) {
    let key = PaillierKeypair::demo();
    let ledger = SurveyLedger::new(MockProvider::new(key), Identity::new("ledger"));
    (ledger, key)
}

/// One ciphertext + proof pair per rating, ready for `submit_ratings`.
pub fn ratings(key: &PaillierKeypair, values: &[u64]) -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
    values.iter().map(|v| key.encrypt(*v)).unzip()
}

pub fn two_item_survey(ledger: &mut SurveyLedger<MockProvider>, admin: &Identity) -> SurveyId {
    ledger
        .create_survey(
            "coffee",
            "rate the brews",
            vec!["A".into(), "B".into()],
            DAY,
            admin.clone(),
            T0,
        )
        .unwrap()
}

/// Plays the oracle: drains the provider's job queue, decrypts each
/// ciphertext, and delivers the plaintext back into the ledger.
pub fn run_oracle(ledger: &mut SurveyLedger<MockProvider>, key: &PaillierKeypair) {
    for job in ledger.provider_mut().take_jobs() {
        let plaintext = key.decrypt_raw(job.ciphertext).to_le_bytes();
        ledger.apply_result(job.request_id, &plaintext).unwrap();
    }
}
