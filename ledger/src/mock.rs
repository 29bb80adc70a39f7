//! Simulated encryption provider and oracle side.
//!
//! A toy additively homomorphic Paillier engine over `i128` with fixed
//! small parameters. Good enough to exercise every ledger path with
//! real ciphertext arithmetic; useless for actual secrecy. Decryption
//! requests are parked in a job queue that an oracle loop drains and
//! answers through `SurveyLedger::apply_result`.

use std::collections::{HashSet, VecDeque};

use sha2::{Digest, Sha256};
use survey_types::{CiphertextHandle, Identity, RequestId};

use crate::error::ProviderError;
use crate::provider::EncryptionProvider;

const PROOF_DOMAIN: &[u8] = b"survey-rating-proof-v1";
const REQUEST_DOMAIN: &[u8] = b"survey-decryption-request-v1";

/// Paillier parameters plus the private half. The oracle and the
/// client-side encryption helper both need it, so it is `Copy` and
/// handed around freely in tests and the demo app.
#[derive(Clone, Copy, Debug)]
pub struct PaillierKeypair {
    n: i128,
    nn: i128,
    g: i128,
    lambda: i128,
    mu: i128,
}

impl PaillierKeypair {
    /// Fixed demo parameters, p = 293 and q = 433. Sums must stay
    /// below n = 126869, far beyond any survey this simulator sees.
    pub fn demo() -> Self {
        let p = 293i128;
        let q = 433i128;
        let n = p * q;
        let nn = n * n;
        let g = n + 1;
        let lambda = (p - 1) * (q - 1);
        let u = pow_mod(g, lambda, nn);
        let mu = inv_mod((u - 1) / n, n).expect("demo parameters are invertible");
        PaillierKeypair { n, nn, g, lambda, mu }
    }

    /// Client-side encryption of one rating: returns the opaque
    /// ciphertext bytes and the validity proof the provider expects.
    pub fn encrypt(&self, rating: u64) -> (Vec<u8>, Vec<u8>) {
        // Fixed r; the simulator does not pretend to hide anything.
        let r = 17i128;
        let c = pow_mod(self.g, rating as i128, self.nn) * pow_mod(r, self.n, self.nn) % self.nn;
        let ciphertext = c.to_le_bytes().to_vec();
        let proof = proof_for(&ciphertext);
        (ciphertext, proof)
    }

    /// Opens a raw ciphertext value. This is the oracle's half of the
    /// protocol; the ledger itself never calls it.
    pub fn decrypt_raw(&self, ciphertext: i128) -> u64 {
        let u = pow_mod(ciphertext, self.lambda, self.nn);
        ((u - 1) / self.n * self.mu % self.n) as u64
    }

    /// E(a) * E(b) mod n² decrypts to a + b.
    fn add(&self, a: i128, b: i128) -> i128 {
        a * b % self.nn
    }
}

fn proof_for(ciphertext: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(PROOF_DOMAIN);
    hasher.update(ciphertext);
    hasher.finalize().to_vec()
}

fn pow_mod(mut base: i128, mut exp: i128, modulus: i128) -> i128 {
    let mut result = 1;
    base %= modulus;
    while exp > 0 {
        if exp % 2 == 1 {
            result = result * base % modulus;
        }
        base = base * base % modulus;
        exp /= 2;
    }
    result
}

fn inv_mod(value: i128, modulus: i128) -> Option<i128> {
    let (mut r0, mut r1) = (modulus, value.rem_euclid(modulus));
    let (mut t0, mut t1) = (0i128, 1i128);
    while r1 != 0 {
        let q = r0 / r1;
        (r0, r1) = (r1, r0 - q * r1);
        (t0, t1) = (t1, t0 - q * t1);
    }
    (r0 == 1).then(|| t0.rem_euclid(modulus))
}

/// A decryption the oracle still owes an answer for.
#[derive(Clone, Copy, Debug)]
pub struct DecryptionJob {
    pub request_id: RequestId,
    pub ciphertext: i128,
}

struct Cell {
    value: i128,
    acl: HashSet<Identity>,
}

/// In-memory provider implementing [`EncryptionProvider`] with the
/// toy Paillier engine. Handles index into an append-only cell store;
/// each cell carries the ACL built up through `authorize`.
pub struct MockProvider {
    key: PaillierKeypair,
    cells: Vec<Cell>,
    jobs: VecDeque<DecryptionJob>,
    request_seq: u64,
}

impl MockProvider {
    pub fn new(key: PaillierKeypair) -> Self {
        MockProvider {
            key,
            cells: Vec::new(),
            jobs: VecDeque::new(),
            request_seq: 0,
        }
    }

    fn store(&mut self, value: i128) -> CiphertextHandle {
        let handle = CiphertextHandle(self.cells.len() as u64);
        self.cells.push(Cell {
            value,
            acl: HashSet::new(),
        });
        handle
    }

    fn cell(&self, handle: CiphertextHandle) -> Result<&Cell, ProviderError> {
        self.cells
            .get(handle.0 as usize)
            .ok_or(ProviderError::UnknownHandle)
    }

    /// Direct decryption for principals granted rights through
    /// `authorize`: the path a survey admin may take instead of
    /// waiting for the oracle.
    pub fn decrypt_as(
        &self,
        who: &Identity,
        handle: CiphertextHandle,
    ) -> Result<u64, ProviderError> {
        let cell = self.cell(handle)?;
        if !cell.acl.contains(who) {
            return Err(ProviderError::NotAuthorized);
        }
        Ok(self.key.decrypt_raw(cell.value))
    }

    /// Drains the decryption work the oracle side should fulfil.
    pub fn take_jobs(&mut self) -> Vec<DecryptionJob> {
        self.jobs.drain(..).collect()
    }
}

impl EncryptionProvider for MockProvider {
    fn from_opaque_input(
        &mut self,
        ciphertext: &[u8],
        proof: &[u8],
    ) -> Result<CiphertextHandle, ProviderError> {
        if proof != proof_for(ciphertext) {
            return Err(ProviderError::InvalidProof);
        }
        let bytes: [u8; 16] = ciphertext
            .try_into()
            .map_err(|_| ProviderError::InvalidProof)?;
        let value = i128::from_le_bytes(bytes);
        if value <= 0 || value >= self.key.nn {
            return Err(ProviderError::InvalidProof);
        }
        Ok(self.store(value))
    }

    fn add(
        &mut self,
        a: CiphertextHandle,
        b: CiphertextHandle,
    ) -> Result<CiphertextHandle, ProviderError> {
        let sum = self.key.add(self.cell(a)?.value, self.cell(b)?.value);
        Ok(self.store(sum))
    }

    fn authorize(
        &mut self,
        handle: CiphertextHandle,
        who: &Identity,
    ) -> Result<(), ProviderError> {
        let cell = self
            .cells
            .get_mut(handle.0 as usize)
            .ok_or(ProviderError::UnknownHandle)?;
        cell.acl.insert(who.clone());
        Ok(())
    }

    fn request_decryption(
        &mut self,
        handle: CiphertextHandle,
    ) -> Result<RequestId, ProviderError> {
        let value = self.cell(handle)?.value;
        self.request_seq += 1;
        let mut hasher = Sha256::new();
        hasher.update(REQUEST_DOMAIN);
        hasher.update(self.request_seq.to_le_bytes());
        let request_id = RequestId(hasher.finalize().into());
        self.jobs.push_back(DecryptionJob {
            request_id,
            ciphertext: value,
        });
        Ok(request_id)
    }
}
