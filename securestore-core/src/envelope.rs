//! Value envelopes: `IV[16] || AES-128-CBC-PKCS7(plaintext)`.
//!
//! A fresh random IV is drawn for every encryption, so equal plaintexts never
//! produce equal envelopes. There is no authentication tag: tampering is only
//! detected when it breaks the padding.

use aes::Aes128;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};

use crate::data_key::DataKey;
use crate::error::{SecureStoreError, SecureStoreResult};

/// Length of the IV prefix.
pub const IV_SIZE: usize = 16;
const BLOCK_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Symmetric encryption of individual values under the data key.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCipher;

impl EnvelopeCipher {
    /// Encrypts `plaintext` under a fresh random IV and returns `IV || ciphertext`.
    #[must_use]
    pub fn encrypt(plaintext: &[u8], key: &DataKey) -> Vec<u8> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);
        let ciphertext = Aes128CbcEnc::new(key.as_bytes().into(), (&iv).into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let mut envelope = Vec::with_capacity(IV_SIZE + ciphertext.len());
        envelope.extend_from_slice(&iv);
        envelope.extend_from_slice(&ciphertext);
        envelope
    }

    /// Splits off the IV and decrypts the remainder.
    ///
    /// # Errors
    ///
    /// Returns [`SecureStoreError::DecryptionFailure`] if the envelope is truncated, not
    /// block aligned, or its padding does not check out (wrong key or corruption).
    pub fn decrypt(envelope: &[u8], key: &DataKey) -> SecureStoreResult<Vec<u8>> {
        if envelope.len() < IV_SIZE + BLOCK_SIZE {
            return Err(SecureStoreError::DecryptionFailure(format!(
                "envelope too short: {} bytes",
                envelope.len()
            )));
        }
        let (iv, ciphertext) = envelope.split_at(IV_SIZE);
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(SecureStoreError::DecryptionFailure(format!(
                "ciphertext length {} is not a multiple of {BLOCK_SIZE}",
                ciphertext.len()
            )));
        }
        Aes128CbcDec::new_from_slices(key.as_bytes(), iv)
            .map_err(|err| SecureStoreError::DecryptionFailure(err.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| SecureStoreError::DecryptionFailure("invalid padding".to_string()))
    }

    /// Encrypts a UTF-8 value and encodes the envelope as base64 text for storage.
    #[must_use]
    pub fn seal_text(value: &str, key: &DataKey) -> String {
        STANDARD.encode(Self::encrypt(value.as_bytes(), key))
    }

    /// Decodes a stored base64 envelope and decrypts it back to text.
    ///
    /// # Errors
    ///
    /// Returns [`SecureStoreError::DecryptionFailure`] on invalid base64, a bad envelope,
    /// or a plaintext that is not UTF-8.
    pub fn open_text(stored: &str, key: &DataKey) -> SecureStoreResult<String> {
        let envelope = decode_base64(stored)
            .map_err(|err| SecureStoreError::DecryptionFailure(err.to_string()))?;
        let plaintext = Self::decrypt(&envelope, key)?;
        String::from_utf8(plaintext)
            .map_err(|err| SecureStoreError::DecryptionFailure(err.to_string()))
    }
}

/// Decodes standard base64, ignoring the line breaks `android.util.Base64.DEFAULT` emits.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if text.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD.decode(compact)
    } else {
        STANDARD.decode(text)
    }
}
