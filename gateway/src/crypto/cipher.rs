//! AES-256-CBC message envelopes.
//!
//! Plaintext layout before padding:
//!
//! ```text
//! random(16) | msg_len (u32 BE) | msg | app_id
//! ```
//!
//! The buffer is PKCS#7 padded to a 32-byte block, encrypted with the key
//! derived from the 43-character EncodingAESKey (IV = first 16 key bytes) and
//! base64 encoded.

use aes::Aes256;
use base64::alphabet;
use base64::engine::{general_purpose, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::Rng;

use crate::error::{Result, WebhookError};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const PAD_BLOCK: usize = 32;
const SEED_LEN: usize = 16;
const HEADER_LEN: usize = SEED_LEN + 4;

/// Console-generated keys do not always zero the unused trailing bits.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// 32-byte AES key decoded from an EncodingAESKey.
#[derive(Clone)]
pub struct AesKey([u8; 32]);

impl AesKey {
    pub fn from_encoding_key(encoding_aes_key: &str) -> Result<Self> {
        let trimmed = encoding_aes_key.trim();
        if trimmed.len() != 43 {
            return Err(WebhookError::Config(format!(
                "EncodingAESKey must be 43 characters, got {}",
                trimmed.len()
            )));
        }

        let raw = KEY_ENGINE
            .decode(format!("{trimmed}="))
            .map_err(|e| WebhookError::Config(format!("invalid EncodingAESKey: {e}")))?;
        let key: [u8; 32] = raw
            .try_into()
            .map_err(|_| WebhookError::Config("EncodingAESKey must decode to 32 bytes".into()))?;

        Ok(Self(key))
    }

    fn iv(&self) -> &[u8] {
        &self.0[..16]
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesKey(..)")
    }
}

/// The 16 random bytes heading a decrypted payload.
///
/// The seed recovered from a request is reused when encrypting its reply.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RandomSeed([u8; SEED_LEN]);

impl RandomSeed {
    pub fn new(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_LEN];
        rand::thread_rng().fill(&mut bytes);
        Self(bytes)
    }
}

impl std::fmt::Debug for RandomSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RandomSeed({})", hex::encode(self.0))
    }
}

/// Decrypt a base64 ciphertext addressed to `app_id`.
pub fn decrypt_message(key: &AesKey, app_id: &str, ciphertext: &str) -> Result<(RandomSeed, Vec<u8>)> {
    let mut buf = general_purpose::STANDARD
        .decode(ciphertext.trim())
        .map_err(|e| WebhookError::Decryption(format!("invalid base64 ciphertext: {e}")))?;

    let plain = Aes256CbcDec::new((&key.0).into(), key.iv().into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| WebhookError::Decryption("ciphertext is not block aligned".into()))?;

    let unpadded = strip_padding(plain)?;
    if unpadded.len() < HEADER_LEN {
        return Err(WebhookError::Decryption("decrypted payload is too short".into()));
    }

    let mut seed = [0u8; SEED_LEN];
    seed.copy_from_slice(&unpadded[..SEED_LEN]);

    let msg_len = u32::from_be_bytes([
        unpadded[SEED_LEN],
        unpadded[SEED_LEN + 1],
        unpadded[SEED_LEN + 2],
        unpadded[SEED_LEN + 3],
    ]) as usize;
    let msg_end = HEADER_LEN.saturating_add(msg_len);
    if msg_end > unpadded.len() {
        return Err(WebhookError::Decryption("declared message length is invalid".into()));
    }

    let from_app_id = &unpadded[msg_end..];
    if from_app_id != app_id.as_bytes() {
        return Err(WebhookError::Decryption(format!(
            "app id mismatch: {:?}",
            String::from_utf8_lossy(from_app_id)
        )));
    }

    Ok((RandomSeed(seed), unpadded[HEADER_LEN..msg_end].to_vec()))
}

/// Encrypt `plaintext` for `app_id`, returning base64 ciphertext.
pub fn encrypt_message(seed: &RandomSeed, plaintext: &[u8], app_id: &str, key: &AesKey) -> Result<String> {
    let msg_len = u32::try_from(plaintext.len())
        .map_err(|_| WebhookError::Encryption("plaintext payload too large".into()))?;

    let mut raw = Vec::with_capacity(HEADER_LEN + plaintext.len() + app_id.len() + PAD_BLOCK);
    raw.extend_from_slice(&seed.0);
    raw.extend_from_slice(&msg_len.to_be_bytes());
    raw.extend_from_slice(plaintext);
    raw.extend_from_slice(app_id.as_bytes());

    let pad_len = PAD_BLOCK - (raw.len() % PAD_BLOCK);
    raw.resize(raw.len() + pad_len, pad_len as u8);

    let len = raw.len();
    let encrypted = Aes256CbcEnc::new((&key.0).into(), key.iv().into())
        .encrypt_padded_mut::<NoPadding>(&mut raw, len)
        .map_err(|_| WebhookError::Encryption("buffer is not block aligned".into()))?;

    Ok(general_purpose::STANDARD.encode(encrypted))
}

fn strip_padding(input: &[u8]) -> Result<&[u8]> {
    let Some(last) = input.last() else {
        return Err(WebhookError::Decryption("empty payload".into()));
    };
    let pad_len = *last as usize;
    if pad_len == 0 || pad_len > PAD_BLOCK || pad_len > input.len() {
        return Err(WebhookError::Decryption("invalid padding length".into()));
    }
    Ok(&input[..input.len() - pad_len])
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";

    #[test]
    fn test_key_rejects_wrong_length() {
        assert!(matches!(
            AesKey::from_encoding_key("short"),
            Err(WebhookError::Config(_))
        ));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip_keeps_seed() {
        let key = AesKey::from_encoding_key(TEST_KEY).unwrap();
        let seed = RandomSeed::new(*b"0123456789abcdef");
        let plain = b"<xml><Content><![CDATA[hi]]></Content></xml>";

        let ciphertext = encrypt_message(&seed, plain, "wx_app", &key).unwrap();
        let (recovered_seed, recovered) = decrypt_message(&key, "wx_app", &ciphertext).unwrap();

        assert_eq!(recovered_seed, seed);
        assert_eq!(recovered, plain);
    }

    #[test]
    fn test_padding_always_added() {
        let key = AesKey::from_encoding_key(TEST_KEY).unwrap();
        let seed = RandomSeed::generate();
        // 16 + 4 + 6 + 6 = 32 bytes: a full extra block of padding is required.
        let ciphertext = encrypt_message(&seed, b"abcdef", "wx_app", &key).unwrap();
        let decoded = general_purpose::STANDARD.decode(&ciphertext).unwrap();
        assert_eq!(decoded.len(), 64);

        let (_, plain) = decrypt_message(&key, "wx_app", &ciphertext).unwrap();
        assert_eq!(plain, b"abcdef");
    }

    #[test]
    fn test_decrypt_rejects_foreign_app_id() {
        let key = AesKey::from_encoding_key(TEST_KEY).unwrap();
        let ciphertext = encrypt_message(&RandomSeed::generate(), b"msg", "wx_other", &key).unwrap();

        let err = decrypt_message(&key, "wx_app", &ciphertext).unwrap_err();
        assert!(matches!(err, WebhookError::Decryption(_)));
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        let key = AesKey::from_encoding_key(TEST_KEY).unwrap();
        assert!(decrypt_message(&key, "wx_app", "not base64!").is_err());
        assert!(decrypt_message(&key, "wx_app", "YWJj").is_err());
    }

    #[test]
    fn test_strip_padding() {
        assert_eq!(strip_padding(&[1, 2, 3, 2, 2]).unwrap(), &[1, 2, 3]);
        assert!(strip_padding(&[]).is_err());
        assert!(strip_padding(&[1, 0]).is_err());
        assert!(strip_padding(&[1, 33]).is_err());
    }
}
