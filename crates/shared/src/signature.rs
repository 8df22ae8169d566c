//! HMAC signature and symmetric secret facade (spec §4.B)
//!
//! Used by the inbound webhook receiver to verify `X-Signature` headers
//! and by the outbound delivery worker to sign bodies before POSTing.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid key length")]
    InvalidKeyLength,
    #[error("ciphertext authentication failed")]
    DecryptionFailed,
    #[error("ciphertext too short to contain a nonce")]
    CiphertextTooShort,
}

/// Sign `payload` with `secret`, returning a lowercase hex digest.
pub fn sign(payload: &[u8], secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify an `X-Signature: sha256=<hex>` style header against a freshly
/// computed HMAC, in constant time. Never panics or propagates an error
/// for malformed input — any parse failure simply returns `false`.
pub fn verify(payload: &[u8], header: &str, secret: &[u8]) -> bool {
    let trimmed = header.trim().to_lowercase();
    let Some(hex_digest) = trimmed.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(given) = hex::decode(hex_digest) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    if given.len() != expected.len() {
        return false;
    }
    given.ct_eq(&expected).into()
}

/// Generate a new webhook secret: `whsec_<32+ URL-safe base64 chars>`
/// sourced from a CSPRNG.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("whsec_{}", URL_SAFE_NO_PAD.encode(bytes))
}

fn aes_key(key: &[u8]) -> Result<Key<Aes256Gcm>, SignatureError> {
    if key.len() != 32 {
        return Err(SignatureError::InvalidKeyLength);
    }
    Ok(*Key::<Aes256Gcm>::from_slice(key))
}

/// Encrypt `plaintext` under `key` (must be exactly 32 bytes). The
/// 12-byte random nonce is prepended to the returned ciphertext.
pub fn encrypt_secret(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let cipher = Aes256Gcm::new(&aes_key(key)?);
    let mut nonce_bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| SignatureError::DecryptionFailed)?;

    let mut out = Vec::with_capacity(12 + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt ciphertext produced by `encrypt_secret`. Tampered ciphertext
/// fails the AES-GCM authenticator and returns `DecryptionFailed`.
pub fn decrypt_secret(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, SignatureError> {
    if ciphertext.len() < 12 {
        return Err(SignatureError::CiphertextTooShort);
    }
    let cipher = Aes256Gcm::new(&aes_key(key)?);
    let (nonce_bytes, body) = ciphertext.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, body)
        .map_err(|_| SignatureError::DecryptionFailed)
}

/// Derive a 32-byte AES key from an arbitrary-length configured secret
/// by hashing it. Lets operators configure `ENCRYPTION_KEY` as any
/// string while still satisfying AES-256's fixed key size.
pub fn derive_key(configured: &str) -> [u8; 32] {
    use sha2::Digest;
    let digest = Sha256::digest(configured.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_matches_sign() {
        let secret = b"supersecret";
        let payload = b"{\"event\":\"form.submitted\"}";
        let sig = sign(payload, secret);
        assert!(verify(payload, &format!("sha256={}", sig), secret));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let payload = b"payload";
        let sig = sign(payload, b"secret-a");
        assert!(!verify(payload, &format!("sha256={}", sig), b"secret-b"));
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let secret = b"secret";
        let sig = sign(b"original", secret);
        assert!(!verify(b"tampered", &format!("sha256={}", sig), secret));
    }

    #[test]
    fn test_verify_is_case_and_whitespace_tolerant_on_header() {
        let secret = b"secret";
        let payload = b"payload";
        let sig = sign(payload, secret);
        let header = format!("  SHA256={}  ", sig.to_uppercase());
        assert!(verify(payload, &header, secret));
    }

    #[test]
    fn test_verify_never_panics_on_malformed_header() {
        assert!(!verify(b"x", "not-a-signature", b"secret"));
        assert!(!verify(b"x", "sha256=not-hex-zz", b"secret"));
        assert!(!verify(b"x", "sha256=", b"secret"));
    }

    #[test]
    fn test_generate_secret_has_expected_prefix_and_length() {
        let s = generate_secret();
        assert!(s.starts_with("whsec_"));
        assert!(s.len() >= 32 + "whsec_".len());
    }

    #[test]
    fn test_generate_secret_is_random() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let key = derive_key("my-configured-key");
        let plaintext = b"whsec_abc123";
        let ciphertext = encrypt_secret(plaintext, &key).unwrap();
        let decrypted = decrypt_secret(&ciphertext, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_tampered_ciphertext_fails() {
        let key = derive_key("my-configured-key");
        let mut ciphertext = encrypt_secret(b"secret-value", &key).unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(decrypt_secret(&ciphertext, &key).is_err());
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let key_a = derive_key("key-a");
        let key_b = derive_key("key-b");
        let ciphertext = encrypt_secret(b"secret-value", &key_a).unwrap();
        assert!(decrypt_secret(&ciphertext, &key_b).is_err());
    }
}
