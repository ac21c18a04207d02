//! The passphrase-sealed message envelope.
//!
//! Layout of a sealed blob:
//!
//! | Offset | Size | Content                                             |
//! |--------|------|-----------------------------------------------------|
//! | 0      | 4    | magic `0x00114514`, big-endian                      |
//! | 4      | 4    | Java `String.hashCode` of the passphrase, big-endian |
//! | 8      | ..   | ciphertext                                          |
//!
//! The hash lets a reader tell "not sealed" apart from "sealed with another
//! passphrase" without attempting decryption. The cipher is pluggable through
//! [`Cipher`]; [`Aes128Cbc`] is the default, keyed by the MD5 digest of the passphrase.
//!
//! # Examples
//!
//! ```rust
//! use wirescope::{crypto::Sealer, Error};
//!
//! let sealer = Sealer::default();
//! let sealed = sealer.seal("ono", b"hello")?;
//! assert_eq!(sealer.open("ono", &sealed)?, b"hello");
//! assert!(matches!(sealer.open("other", &sealed), Err(Error::KeyMismatch)));
//! assert!(matches!(sealer.open("ono", b"plain"), Err(Error::NotEncrypted)));
//! # Ok::<(), wirescope::Error>(())
//! ```

use std::sync::Arc;

use aes::Aes128;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};

use crate::{wire::io, Error, Result};

/// Envelope magic.
pub const ENVELOPE_MAGIC: u32 = 0x0011_4514;

/// Size of the envelope header.
pub const HEADER_LEN: usize = 8;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// A symmetric cipher keyed by a 16-byte key.
pub trait Cipher: Send + Sync {
    /// Encrypt `data`.
    ///
    /// # Errors
    /// Returns [`Error::Crypto`] if the cipher rejects the input.
    fn encrypt(&self, key: &[u8; 16], data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt `data`.
    ///
    /// # Errors
    /// Returns [`Error::Crypto`] for bad lengths or padding.
    fn decrypt(&self, key: &[u8; 16], data: &[u8]) -> Result<Vec<u8>>;
}

/// AES-128 in CBC mode with PKCS#7 padding; the key doubles as the IV.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes128Cbc;

impl Cipher for Aes128Cbc {
    fn encrypt(&self, key: &[u8; 16], data: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes128CbcEnc::new(key.into(), key.into());
        let block_size = 16;
        let padded_len = (data.len() / block_size + 1) * block_size;
        let mut buf = vec![0u8; padded_len];
        buf[..data.len()].copy_from_slice(data);
        let sealed = cipher
            .encrypt_padded_mut::<Pkcs7>(&mut buf, data.len())
            .map_err(|_| Error::Crypto("buffer too small for padding".to_string()))?;
        Ok(sealed.to_vec())
    }

    fn decrypt(&self, key: &[u8; 16], data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() || data.len() % 16 != 0 {
            return Err(Error::Crypto(format!(
                "ciphertext length {} is not a positive multiple of 16",
                data.len()
            )));
        }
        let cipher = Aes128CbcDec::new(key.into(), key.into());
        let mut buf = data.to_vec();
        let plain = cipher
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| Error::Crypto("invalid padding".to_string()))?;
        Ok(plain.to_vec())
    }
}

/// Java `String.hashCode` over UTF-16 code units.
#[must_use]
pub fn java_hash_code(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Cipher key for a passphrase: its MD5 digest.
#[must_use]
pub fn derive_key(passphrase: &str) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(passphrase.as_bytes());
    hasher.finalize().into()
}

/// Returns `true` if `data` starts with the envelope magic.
#[must_use]
pub fn is_sealed(data: &[u8]) -> bool {
    io::read_be::<u32>(data).is_ok_and(|magic| magic == ENVELOPE_MAGIC)
}

/// Seals and opens envelopes with a [`Cipher`].
#[derive(Clone)]
pub struct Sealer {
    cipher: Arc<dyn Cipher>,
}

impl Default for Sealer {
    fn default() -> Self {
        Sealer::new(Arc::new(Aes128Cbc))
    }
}

impl Sealer {
    /// Use `cipher` for the payload.
    #[must_use]
    pub fn new(cipher: Arc<dyn Cipher>) -> Self {
        Sealer { cipher }
    }

    /// Seal `plaintext` under `passphrase`.
    ///
    /// # Errors
    /// As the cipher.
    pub fn seal(&self, passphrase: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = self.cipher.encrypt(&derive_key(passphrase), plaintext)?;
        let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        io::put_be(&mut out, ENVELOPE_MAGIC);
        io::put_be(&mut out, java_hash_code(passphrase));
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Open a sealed blob.
    ///
    /// # Errors
    /// Returns [`Error::NotEncrypted`] if the magic is missing, [`Error::KeyMismatch`]
    /// if the blob was sealed under another passphrase and [`Error::Crypto`] if the
    /// ciphertext is damaged.
    pub fn open(&self, passphrase: &str, data: &[u8]) -> Result<Vec<u8>> {
        let mut offset = 0;
        let magic = io::read_be_at::<u32>(data, &mut offset).map_err(|_| Error::NotEncrypted)?;
        if magic != ENVELOPE_MAGIC {
            return Err(Error::NotEncrypted);
        }
        let hash = io::read_be_at::<i32>(data, &mut offset).map_err(|_| Error::NotEncrypted)?;
        if hash != java_hash_code(passphrase) {
            return Err(Error::KeyMismatch);
        }

        self.cipher.decrypt(&derive_key(passphrase), &data[offset..])
    }
}
