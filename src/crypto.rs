//! AES-CFB symmetric encryption for session cookies.
//!
//! The key is derived once at startup from the configured `general.secret`
//! and held for the process lifetime; there is no rotation.

use aes::Aes256;
use aes::cipher::{AsyncStreamCipher as _, KeyIvInit as _};
use cfb_mode::{Decryptor, Encryptor};
use eyre::{Result, bail};
use rand::RngCore as _;
use secrecy::{ExposeSecret as _, SecretString};

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

type Aes256CfbEnc = Encryptor<Aes256>;
type Aes256CfbDec = Decryptor<Aes256>;

/// Derives the 32-byte AES-256 key from a configured secret string.
///
/// Shorter secrets are right-padded with `'A'`; longer ones are truncated to
/// the first 32 bytes. An empty secret is a startup error.
pub(crate) fn derive_key(secret: &SecretString) -> Result<[u8; KEY_LEN]> {
    let secret = secret.expose_secret();
    if secret.is_empty() {
        bail!("general.secret must be configured and non-empty");
    }
    let mut padded = secret.to_owned();
    while padded.len() < KEY_LEN {
        padded.push('A');
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&padded.as_bytes()[..KEY_LEN]);
    Ok(key)
}

/// Encrypts `plaintext` with a fresh random IV, prepended to the ciphertext.
pub(crate) fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let mut buf = plaintext.to_vec();
    Aes256CfbEnc::new(key.into(), &iv.into()).encrypt(&mut buf);

    let mut out = Vec::with_capacity(IV_LEN + buf.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&buf);
    out
}

/// Decrypts a ciphertext produced by [`encrypt`]. Rejects inputs shorter than
/// the IV length.
pub(crate) fn decrypt(key: &[u8; KEY_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < IV_LEN {
        bail!("ciphertext too short");
    }
    let (iv, body) = ciphertext.split_at(IV_LEN);
    let mut buf = body.to_vec();
    Aes256CfbDec::new(key.into(), iv.into()).decrypt(&mut buf);
    Ok(buf)
}
