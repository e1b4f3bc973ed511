use data_encoding::HEXLOWER_PERMISSIVE;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::model::address::Address;

use super::AuthFailure;

/// Length of a recoverable signature: `r || s || v`.
pub const SIGNATURE_LENGTH: usize = 65;

const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Hash `message` the way wallets do before a personal-message signature.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Recover the address that produced `signature` (hex, optionally `0x`-prefixed)
/// over the personal message `message`.
pub fn recover_personal_signer(message: &[u8], signature: &str) -> Result<Address, AuthFailure> {
    let hex = signature
        .strip_prefix("0x")
        .or_else(|| signature.strip_prefix("0X"))
        .unwrap_or(signature);
    let bytes = HEXLOWER_PERMISSIVE
        .decode(hex.as_bytes())
        .map_err(|_| AuthFailure::MalformedSignature("not valid hex".to_string()))?;
    if bytes.len() != SIGNATURE_LENGTH {
        return Err(AuthFailure::MalformedSignature(format!(
            "expected {SIGNATURE_LENGTH} bytes, found {}",
            bytes.len()
        )));
    }

    // Wallets encode the recovery ID as 27 or 28.
    let v = bytes[64];
    let v = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| AuthFailure::MalformedSignature(format!("bad recovery id {v}")))?;
    let signature = Signature::from_slice(&bytes[..64])
        .map_err(|e| AuthFailure::MalformedSignature(e.to_string()))?;

    let hash = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&hash, &signature, recovery_id)
        .map_err(|_| AuthFailure::InvalidSignature)?;
    let point = key.to_encoded_point(false);
    Ok(Address::from_public_key(&point.as_bytes()[1..]))
}

/// Deterministic wallets for tests.
#[cfg(test)]
pub mod examples {
    use data_encoding::HEXLOWER;
    use k256::ecdsa::SigningKey;

    use super::*;

    pub struct TestWallet {
        key: SigningKey,
    }

    impl TestWallet {
        /// A wallet with a fixed secret key derived from `n`.
        pub fn new(n: u8) -> Self {
            let mut secret = [0u8; 32];
            secret[31] = n.wrapping_add(1);
            secret[0] = 0x11;
            Self {
                key: SigningKey::from_slice(&secret).unwrap(),
            }
        }

        pub fn root() -> Self {
            Self::new(0)
        }

        pub fn admin() -> Self {
            Self::new(1)
        }

        pub fn user() -> Self {
            Self::new(2)
        }

        pub fn address(&self) -> Address {
            let point = self.key.verifying_key().to_encoded_point(false);
            Address::from_public_key(&point.as_bytes()[1..])
        }

        /// Produce a personal-message signature, `0x`-prefixed hex with `v` in {27, 28}.
        pub fn sign(&self, message: &str) -> String {
            let hash = personal_message_hash(message.as_bytes());
            let (signature, recovery_id) = self.key.sign_prehash_recoverable(&hash).unwrap();
            let mut bytes = signature.to_bytes().to_vec();
            bytes.push(recovery_id.to_byte() + 27);
            format!("0x{}", HEXLOWER.encode(&bytes))
        }
    }
}
