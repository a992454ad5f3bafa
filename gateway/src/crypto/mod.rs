//! Signing and AES envelope primitives bound to one platform account.

pub mod cipher;
pub mod signature;

use rand::{distributions::Alphanumeric, Rng};

use crate::error::{Result, SignatureScope, WebhookError};

pub use cipher::{decrypt_message, encrypt_message, AesKey, RandomSeed};
pub use signature::{sign, validate_query_signature, verify_message_signature};

/// Account credentials for signing, verifying and (un)wrapping envelopes.
///
/// Built once at start-up and shared read-only across requests.
#[derive(Debug, Clone)]
pub struct MessageCrypt {
    token: String,
    app_id: String,
    aes_key: Option<AesKey>,
}

impl MessageCrypt {
    /// `encoding_aes_key` is only needed for safe-mode callbacks.
    pub fn new(token: &str, app_id: &str, encoding_aes_key: Option<&str>) -> Result<Self> {
        let aes_key = encoding_aes_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(AesKey::from_encoding_key)
            .transpose()?;

        Ok(Self {
            token: token.trim().to_string(),
            app_id: app_id.trim().to_string(),
            aes_key,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn has_aes_key(&self) -> bool {
        self.aes_key.is_some()
    }

    /// Check `msg_signature`, then decrypt the ciphertext.
    pub fn open(
        &self,
        timestamp: &str,
        nonce: &str,
        ciphertext: &str,
        msg_signature: &str,
    ) -> Result<(RandomSeed, Vec<u8>)> {
        if !verify_message_signature(&self.token, timestamp, nonce, ciphertext, msg_signature) {
            return Err(WebhookError::Authentication {
                scope: SignatureScope::Message,
            });
        }
        decrypt_message(self.key()?, &self.app_id, ciphertext)
    }

    /// Encrypt a reply and sign the resulting ciphertext.
    ///
    /// Returns `(ciphertext, msg_signature)`.
    pub fn seal(
        &self,
        seed: &RandomSeed,
        plaintext: &[u8],
        timestamp: &str,
        nonce: &str,
    ) -> Result<(String, String)> {
        let ciphertext = encrypt_message(seed, plaintext, &self.app_id, self.key()?)?;
        let msg_signature = sign(&[&self.token, timestamp, nonce, &ciphertext]);
        Ok((ciphertext, msg_signature))
    }

    fn key(&self) -> Result<&AesKey> {
        self.aes_key
            .as_ref()
            .ok_or_else(|| WebhookError::Config("EncodingAESKey is not configured".into()))
    }
}

/// Random alphanumeric nonce for replies to requests that carried none.
pub fn random_nonce(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
