mod common;

use common::{new_ledger, ratings, run_oracle, two_item_survey, DAY, T0};
use survey_ledger::{ApplyOutcome, LedgerError, ProviderError};
use survey_types::{Identity, RequestId};

#[test_log::test]
fn end_to_end_survey_round() {
    let (mut ledger, key) = new_ledger();
    let admin = Identity::new("admin");
    let id = ledger
        .create_survey(
            "espresso machines",
            "rate both candidates",
            vec!["A".into(), "B".into()],
            DAY,
            admin.clone(),
            T0,
        )
        .unwrap();

    let (cts, proofs) = ratings(&key, &[4, 5]);
    ledger.submit_ratings(id, &Identity::new("r1"), &cts, &proofs, T0 + 10).unwrap();
    let (cts, proofs) = ratings(&key, &[3, 4]);
    ledger.submit_ratings(id, &Identity::new("r2"), &cts, &proofs, T0 + 20).unwrap();

    ledger.end_survey(id, T0 + DAY).unwrap();

    ledger.request_reveal(id, 0).unwrap();
    run_oracle(&mut ledger, &key);
    assert_eq!(ledger.decrypted_sum(id, 0).unwrap(), 7);

    ledger.request_reveal(id, 1).unwrap();
    run_oracle(&mut ledger, &key);
    assert_eq!(ledger.decrypted_sum(id, 1).unwrap(), 9);

    ledger.finalize(id, &admin).unwrap();

    let survey = ledger.survey(id).unwrap();
    assert_eq!(survey.response_count, 2);
    // Averages are computed externally from sum and counter.
    assert_eq!(ledger.decrypted_sum(id, 0).unwrap() as f64 / 2.0, 3.5);
    assert_eq!(ledger.decrypted_sum(id, 1).unwrap() as f64 / 2.0, 4.5);
}

#[test]
fn reveal_preconditions() {
    let (mut ledger, key) = new_ledger();
    let admin = Identity::new("admin");
    let id = two_item_survey(&mut ledger, &admin);
    let (cts, proofs) = ratings(&key, &[4, 5]);
    ledger.submit_ratings(id, &Identity::new("r1"), &cts, &proofs, T0 + 1).unwrap();

    let open = ledger.request_reveal(id, 0);
    assert_eq!(open.unwrap_err(), LedgerError::SurveyStillOpen(id));

    ledger.end_survey(id, T0 + DAY).unwrap();
    let bad_index = ledger.request_reveal(id, 2);
    assert_eq!(
        bad_index.unwrap_err(),
        LedgerError::InvalidItemIndex { index: 2, count: 2 }
    );

    // A survey nobody submitted to has no ciphertext sum to open.
    let empty = two_item_survey(&mut ledger, &admin);
    ledger.end_survey(empty, T0 + DAY).unwrap();
    assert_eq!(
        ledger.request_reveal(empty, 0).unwrap_err(),
        LedgerError::NothingToReveal(empty, 0)
    );
}

#[test]
fn second_reveal_request_fails_while_first_is_pending() {
    let (mut ledger, key) = new_ledger();
    let admin = Identity::new("admin");
    let id = two_item_survey(&mut ledger, &admin);
    let (cts, proofs) = ratings(&key, &[4, 5]);
    ledger.submit_ratings(id, &Identity::new("r1"), &cts, &proofs, T0 + 1).unwrap();
    ledger.end_survey(id, T0 + DAY).unwrap();

    ledger.request_reveal(id, 0).unwrap();
    let pending = ledger.request_reveal(id, 0);
    assert_eq!(pending.unwrap_err(), LedgerError::RevealAlreadyPending(id, 0));

    run_oracle(&mut ledger, &key);
    let revealed = ledger.request_reveal(id, 0);
    assert_eq!(revealed.unwrap_err(), LedgerError::ItemAlreadyRevealed(id, 0));
}

#[test]
fn result_applies_exactly_once() {
    let (mut ledger, key) = new_ledger();
    let admin = Identity::new("admin");
    let id = two_item_survey(&mut ledger, &admin);
    let (cts, proofs) = ratings(&key, &[4, 5]);
    ledger.submit_ratings(id, &Identity::new("r1"), &cts, &proofs, T0 + 1).unwrap();
    ledger.end_survey(id, T0 + DAY).unwrap();

    let request_id = ledger.request_reveal(id, 0).unwrap();
    let job = ledger.provider_mut().take_jobs().pop().unwrap();
    assert_eq!(job.request_id, request_id);

    let plaintext = key.decrypt_raw(job.ciphertext).to_le_bytes();
    let first = ledger.apply_result(request_id, &plaintext).unwrap();
    assert_eq!(
        first,
        ApplyOutcome::Applied { survey_id: id, item_index: 0, sum: 4 }
    );

    // Redelivery is a no-op, even with a doctored payload.
    let second = ledger.apply_result(request_id, &99u64.to_le_bytes()).unwrap();
    assert_eq!(second, ApplyOutcome::AlreadyApplied);
    assert_eq!(ledger.decrypted_sum(id, 0).unwrap(), 4);
}

#[test]
fn forged_request_id_is_rejected() {
    let (mut ledger, key) = new_ledger();
    let admin = Identity::new("admin");
    let id = two_item_survey(&mut ledger, &admin);
    let (cts, proofs) = ratings(&key, &[4, 5]);
    ledger.submit_ratings(id, &Identity::new("r1"), &cts, &proofs, T0 + 1).unwrap();
    ledger.end_survey(id, T0 + DAY).unwrap();
    ledger.request_reveal(id, 0).unwrap();

    let forged = RequestId([0xab; 32]);
    let outcome = ledger.apply_result(forged, &7u64.to_le_bytes());
    assert_eq!(outcome.unwrap_err(), LedgerError::UnknownRequest(forged));
    assert!(ledger.decrypted_sum(id, 0).is_err());
}

#[test]
fn short_payload_keeps_the_request_pending() {
    let (mut ledger, key) = new_ledger();
    let admin = Identity::new("admin");
    let id = two_item_survey(&mut ledger, &admin);
    let (cts, proofs) = ratings(&key, &[4, 5]);
    ledger.submit_ratings(id, &Identity::new("r1"), &cts, &proofs, T0 + 1).unwrap();
    ledger.end_survey(id, T0 + DAY).unwrap();

    let request_id = ledger.request_reveal(id, 0).unwrap();
    let job = ledger.provider_mut().take_jobs().pop().unwrap();

    let short = ledger.apply_result(request_id, &[1, 2, 3, 4]);
    assert_eq!(
        short.unwrap_err(),
        LedgerError::MalformedPlaintext { expected: 8, got: 4 }
    );

    // The oracle can redeliver a well-formed payload afterwards.
    let plaintext = key.decrypt_raw(job.ciphertext).to_le_bytes();
    let outcome = ledger.apply_result(request_id, &plaintext).unwrap();
    assert_eq!(
        outcome,
        ApplyOutcome::Applied { survey_id: id, item_index: 0, sum: 4 }
    );
}

#[test]
fn accumulation_is_order_independent() {
    let submissions: [(&str, [u64; 2]); 3] = [("r1", [4, 5]), ("r2", [3, 4]), ("r3", [5, 2])];

    let mut sums = Vec::new();
    for order in [[0, 1, 2], [2, 0, 1], [1, 2, 0]] {
        let (mut ledger, key) = new_ledger();
        let admin = Identity::new("admin");
        let id = two_item_survey(&mut ledger, &admin);
        for slot in order {
            let (who, values) = &submissions[slot];
            let (cts, proofs) = ratings(&key, values);
            ledger
                .submit_ratings(id, &Identity::new(*who), &cts, &proofs, T0 + 1)
                .unwrap();
        }
        ledger.end_survey(id, T0 + DAY).unwrap();
        ledger.request_reveal(id, 0).unwrap();
        ledger.request_reveal(id, 1).unwrap();
        run_oracle(&mut ledger, &key);
        sums.push((
            ledger.decrypted_sum(id, 0).unwrap(),
            ledger.decrypted_sum(id, 1).unwrap(),
        ));
    }

    assert_eq!(sums, vec![(12, 11), (12, 11), (12, 11)]);
}

#[test]
fn admin_may_decrypt_directly_through_the_provider() {
    let (mut ledger, key) = new_ledger();
    let admin = Identity::new("admin");
    let id = two_item_survey(&mut ledger, &admin);
    let (cts, proofs) = ratings(&key, &[4, 5]);
    ledger.submit_ratings(id, &Identity::new("r1"), &cts, &proofs, T0 + 1).unwrap();
    let (cts, proofs) = ratings(&key, &[3, 4]);
    ledger.submit_ratings(id, &Identity::new("r2"), &cts, &proofs, T0 + 2).unwrap();

    let sum_handle = ledger.encrypted_sum(id, 0).unwrap().unwrap();
    assert_eq!(ledger.provider().decrypt_as(&admin, sum_handle), Ok(7));
    assert_eq!(
        ledger.provider().decrypt_as(&Identity::new("stranger"), sum_handle),
        Err(ProviderError::NotAuthorized)
    );
}

#[test]
fn zero_sum_is_distinguishable_from_unrevealed() {
    let (mut ledger, key) = new_ledger();
    let admin = Identity::new("admin");
    let id = two_item_survey(&mut ledger, &admin);
    let (cts, proofs) = ratings(&key, &[0, 3]);
    ledger.submit_ratings(id, &Identity::new("r1"), &cts, &proofs, T0 + 1).unwrap();
    ledger.end_survey(id, T0 + DAY).unwrap();

    assert_eq!(
        ledger.decrypted_sum(id, 0).unwrap_err(),
        LedgerError::NotRevealed(id, 0)
    );

    ledger.request_reveal(id, 0).unwrap();
    run_oracle(&mut ledger, &key);
    assert_eq!(ledger.decrypted_sum(id, 0).unwrap(), 0);
}
