//! Asymmetric channel between the broker and the password servers.
//!
//! Uses:
//! - RSA PKCS#1 v1.5 for block encryption (the scheme the password servers
//!   speak)
//! - base64 (standard alphabet) as the textual block encoding
//!
//! Secret-bearing responses are encrypted to the broker's public key and
//! chunked into fixed-size blocks when the payload exceeds one block. The
//! block length is a property of the key modulus, never a free constant.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid base64 encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Decryption failed - malformed or tampered block")]
    DecryptionFailed,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decrypted payload is not valid UTF-8")]
    InvalidPlaintext,
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// The broker's end of the asymmetric channel.
///
/// Holds the private key (read-only after load) and exposes block-level
/// decryption. Encryption happens on the password-server side; the
/// encrypt helpers here are the counterpart kept for mock servers and
/// demo tooling.
pub struct AsymmetricChannel {
    private: RsaPrivateKey,
    public: RsaPublicKey,
    block_len: usize,
}

impl AsymmetricChannel {
    /// Wrap an existing private key.
    pub fn new(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        // base64 of one modulus-sized ciphertext: 4 chars per 3 bytes,
        // rounded up (344 for a 2048-bit key)
        let block_len = 4 * ((private.size() + 2) / 3);
        Self {
            private,
            public,
            block_len,
        }
    }

    /// Generate a fresh keypair.
    pub fn generate(bits: usize) -> CryptoResult<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self::new(private))
    }

    /// Load the private key from a PKCS#8 PEM document.
    pub fn from_pkcs8_pem(pem: &str) -> CryptoResult<Self> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self::new(private))
    }

    /// Expected length, in base64 characters, of one ciphertext block.
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Largest plaintext (bytes) that fits in one block under PKCS#1 v1.5.
    pub fn max_plaintext_len(&self) -> usize {
        self.private.size() - 11
    }

    /// Decrypt a single ciphertext block addressed to the broker.
    ///
    /// A padding or validity failure is fatal for the containing request;
    /// callers never return partial plaintext.
    pub fn decrypt_block(&self, block: &str) -> CryptoResult<Vec<u8>> {
        let ciphertext = BASE64.decode(block)?;
        self.private
            .decrypt(Pkcs1v15Encrypt, &ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Encrypt one plaintext chunk to the broker's public key.
    pub fn encrypt_block(&self, plaintext: &[u8]) -> CryptoResult<String> {
        let ciphertext = self
            .public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;
        Ok(BASE64.encode(ciphertext))
    }

    /// Encrypt an arbitrary payload as a sequence of concatenated
    /// fixed-size blocks, the format the password servers produce.
    pub fn encrypt_blocks(&self, plaintext: &[u8]) -> CryptoResult<String> {
        let mut out = String::new();
        for chunk in plaintext.chunks(self.max_plaintext_len()) {
            out.push_str(&self.encrypt_block(chunk)?);
        }
        Ok(out)
    }

    /// Public key as PEM, handed to password servers at registration.
    pub fn public_key_pem(&self) -> CryptoResult<String> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Private key as PKCS#8 PEM, for persisting across restarts.
    pub fn private_key_pem(&self) -> CryptoResult<String> {
        self.private
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl std::fmt::Debug for AsymmetricChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsymmetricChannel")
            .field("block_len", &self.block_len)
            .finish_non_exhaustive()
    }
}
