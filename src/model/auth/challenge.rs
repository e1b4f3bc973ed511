use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use data_encoding::HEXLOWER;
use parking_lot::Mutex;
use rand::Rng;

use crate::model::address::Address;

use super::{recover_personal_signer, AuthFailure};

const NONCE_BYTES: usize = 32;

/// Default bound on outstanding challenges.
pub const MAX_OUTSTANDING: usize = 10_000;

/// A nonce issued to an address, awaiting its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChallenge {
    /// The exact message the wallet must sign.
    pub nonce: String,
    pub expire_at: DateTime<Utc>,
}

/// Server-side store of outstanding challenges, at most one per address.
/// Every challenge is single-use: the first verification attempt consumes it.
/// When full, issuing a challenge to a new address evicts the one closest to expiry.
pub struct ChallengeStore {
    ttl: Duration,
    limit: usize,
    pending: Mutex<HashMap<Address, PendingChallenge>>,
}

impl ChallengeStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_limit(ttl, MAX_OUTSTANDING)
    }

    pub fn with_limit(ttl: Duration, limit: usize) -> Self {
        Self {
            ttl,
            limit: limit.max(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh nonce for `address`, replacing any outstanding one.
    pub fn issue(&self, address: Address) -> PendingChallenge {
        let mut nonce = [0u8; NONCE_BYTES];
        rand::thread_rng().fill(&mut nonce);
        let now = Utc::now();
        let challenge = PendingChallenge {
            nonce: HEXLOWER.encode(&nonce),
            expire_at: now + self.ttl,
        };

        let mut pending = self.pending.lock();
        pending.retain(|_, c| c.expire_at > now);
        if pending.len() >= self.limit && !pending.contains_key(&address) {
            let oldest = pending
                .iter()
                .min_by_key(|(_, c)| c.expire_at)
                .map(|(address, _)| *address);
            if let Some(oldest) = oldest {
                warn!("Challenge store full, evicting challenge for {oldest}");
                pending.remove(&oldest);
            }
        }
        pending.insert(address, challenge.clone());
        challenge
    }

    /// Check that `signature` over the outstanding nonce was produced by `address`.
    pub fn verify(&self, address: &Address, signature: &str) -> Result<(), AuthFailure> {
        self.verify_at(address, signature, Utc::now())
    }

    fn verify_at(
        &self,
        address: &Address,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthFailure> {
        let challenge = self
            .pending
            .lock()
            .remove(address)
            .ok_or(AuthFailure::ChallengeNotFound)?;
        if challenge.expire_at <= now {
            return Err(AuthFailure::ChallengeExpired);
        }
        let signer = recover_personal_signer(challenge.nonce.as_bytes(), signature)?;
        if signer != *address {
            return Err(AuthFailure::InvalidSignature);
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }
}
