use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::constants::{ADMIN_SESSION_PAYLOAD, API_KEY_BYTES, KDF_CONTEXT_SESSION_KEY};
use crate::error::CredentialError;

const SALT_SIZE: usize = 32;

/// Generate a fresh agent credential: 32 random bytes, hex encoded.
pub fn generate_api_key() -> String {
    let mut key = [0u8; API_KEY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut key);
    hex::encode(key)
}

// Stored form: <salt hex>$<keyed blake3 hex>
pub fn hash_api_key(api_key: &str) -> String {
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let digest = salted_digest(&salt, api_key);
    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

/// Check a presented credential against a stored hash.
///
/// An empty stored hash means the agent was revoked and never matches.
pub fn verify_api_key(api_key: &str, stored_hash: &str) -> Result<bool, CredentialError> {
    if stored_hash.is_empty() {
        return Err(CredentialError::Revoked);
    }

    let (salt_hex, digest_hex) = stored_hash
        .split_once('$')
        .ok_or(CredentialError::MalformedHash)?;
    let salt = decode_32(salt_hex)?;
    let expected = decode_32(digest_hex)?;

    let actual = salted_digest(&salt, api_key);
    Ok(actual[..].ct_eq(&expected[..]).into())
}

fn salted_digest(salt: &[u8; SALT_SIZE], api_key: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_keyed(salt);
    hasher.update(api_key.as_bytes());
    *hasher.finalize().as_bytes()
}

fn decode_32(hex_str: &str) -> Result<[u8; 32], CredentialError> {
    let bytes = hex::decode(hex_str).map_err(|_| CredentialError::MalformedHash)?;
    bytes.try_into().map_err(|_| CredentialError::MalformedHash)
}

// BLAKE3 KDF with domain separation
fn derive_session_key(secret: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_SESSION_KEY);
    hasher.update(secret.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Admin session token: keyed MAC of a fixed payload under the session secret.
///
/// Deterministic, so a token stays valid until the secret changes.
pub fn admin_session_token(secret: &str) -> String {
    let key = derive_session_key(secret);
    hex::encode(blake3::keyed_hash(&key, ADMIN_SESSION_PAYLOAD).as_bytes())
}

pub fn verify_admin_session(token: &str, secret: &str) -> bool {
    let expected = admin_session_token(secret);
    let token = token.as_bytes();
    let expected = expected.as_bytes();
    token.len() == expected.len() && token.ct_eq(expected).into()
}

/// Constant-time string equality (admin login form).
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_format() {
        let key = generate_api_key();
        assert_eq!(key.len(), API_KEY_BYTES * 2);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_api_key());
    }

    #[test]
    fn test_hash_verifies_only_matching_key() {
        let key = generate_api_key();
        let hash = hash_api_key(&key);

        assert!(!hash.contains(&key));
        assert!(verify_api_key(&key, &hash).unwrap());
        assert!(!verify_api_key(&generate_api_key(), &hash).unwrap());
    }

    #[test]
    fn test_hash_is_salted() {
        let key = generate_api_key();
        assert_ne!(hash_api_key(&key), hash_api_key(&key));
    }

    #[test]
    fn test_revoked_hash_never_verifies() {
        assert_eq!(
            verify_api_key("anything", ""),
            Err(CredentialError::Revoked)
        );
    }

    #[test]
    fn test_malformed_hash() {
        assert_eq!(
            verify_api_key("key", "not-a-hash"),
            Err(CredentialError::MalformedHash)
        );
        assert_eq!(
            verify_api_key("key", "abcd$ef"),
            Err(CredentialError::MalformedHash)
        );
    }

    #[test]
    fn test_session_token_deterministic_per_secret() {
        let token = admin_session_token("secret-a");
        assert_eq!(token, admin_session_token("secret-a"));
        assert!(verify_admin_session(&token, "secret-a"));
        assert!(!verify_admin_session(&token, "secret-b"));
        assert!(!verify_admin_session("", "secret-a"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("admin", "admin"));
        assert!(!constant_time_eq("admin", "admin "));
        assert!(!constant_time_eq("admin", "Admin"));
    }
}
