//! Cryptographic capability used by the verifier.

use rsa::pkcs8::{DecodePrivateKey as _, DecodePublicKey as _};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest as _, Sha256, Sha384, Sha512};

use crate::BackendError;
use crate::algorithm::{DigestAlgorithm, PaddingScheme, SignatureScheme};

/// Outcome of a signature check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Verdict {
    /// The signature matches.
    Valid,
    /// The signature was checked and does not match.
    Invalid,
    /// The check could not be performed.
    UnsupportedAlgorithm(String),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Convert to a result, mapping each failure to its error kind.
    pub fn into_result(self) -> Result<(), crate::VerificationError> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid => Err(crate::VerificationError::InvalidSignature),
            Self::UnsupportedAlgorithm(what) => {
                Err(crate::VerificationError::UnsupportedAlgorithm(what))
            }
        }
    }
}

/// Digest, verify, and sign over byte sequences.
pub trait CryptoBackend: Send + Sync {
    /// Hash `data`.
    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8>;

    /// Check `signature` over `message` with a DER `SubjectPublicKeyInfo`.
    fn verify(
        &self,
        public_key: &[u8],
        scheme: SignatureScheme,
        message: &[u8],
        signature: &[u8],
    ) -> Verdict;

    /// Sign `message` with a DER PKCS#8 private key.
    fn sign(
        &self,
        private_key: &[u8],
        scheme: SignatureScheme,
        message: &[u8],
    ) -> Result<Vec<u8>, BackendError>;
}

/// Backend built on the RustCrypto `rsa`, `sha1`, and `sha2` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoBackend;

impl RustCryptoBackend {
    fn padding(scheme: SignatureScheme) -> Pkcs1v15Sign {
        match scheme.padding {
            PaddingScheme::Pkcs1v15 => match scheme.digest {
                DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
                DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
                DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
                DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
            },
        }
    }
}

impl CryptoBackend for RustCryptoBackend {
    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
        match algorithm {
            DigestAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    fn verify(
        &self,
        public_key: &[u8],
        scheme: SignatureScheme,
        message: &[u8],
        signature: &[u8],
    ) -> Verdict {
        let key = match RsaPublicKey::from_public_key_der(public_key) {
            Ok(key) => key,
            Err(e) => return Verdict::UnsupportedAlgorithm(format!("public key: {e}")),
        };

        let hashed = self.digest(scheme.digest, message);
        match key.verify(Self::padding(scheme), &hashed, signature) {
            Ok(()) => Verdict::Valid,
            Err(_) => Verdict::Invalid,
        }
    }

    fn sign(
        &self,
        private_key: &[u8],
        scheme: SignatureScheme,
        message: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        let key = RsaPrivateKey::from_pkcs8_der(private_key)
            .map_err(|e| BackendError::InvalidKey(e.to_string()))?;

        let hashed = self.digest(scheme.digest, message);
        key.sign(Self::padding(scheme), &hashed)
            .map_err(|e| BackendError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_lengths() {
        let backend = RustCryptoBackend;
        assert_eq!(backend.digest(DigestAlgorithm::Sha1, b"abc").len(), 20);
        assert_eq!(backend.digest(DigestAlgorithm::Sha256, b"abc").len(), 32);
        assert_eq!(backend.digest(DigestAlgorithm::Sha384, b"abc").len(), 48);
        assert_eq!(backend.digest(DigestAlgorithm::Sha512, b"abc").len(), 64);
    }

    #[test]
    fn test_sha1_known_answer() {
        let digest = RustCryptoBackend.digest(DigestAlgorithm::Sha1, b"abc");
        assert_eq!(
            digest,
            [
                0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50,
                0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
            ]
        );
    }

    #[test]
    fn test_non_key_is_unsupported() {
        let scheme = SignatureScheme {
            padding: PaddingScheme::Pkcs1v15,
            digest: DigestAlgorithm::Sha256,
        };
        let verdict = RustCryptoBackend.verify(b"not a key", scheme, b"msg", b"sig");
        assert!(matches!(verdict, Verdict::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_sign_rejects_bad_key() {
        let scheme = SignatureScheme {
            padding: PaddingScheme::Pkcs1v15,
            digest: DigestAlgorithm::Sha256,
        };
        assert!(matches!(
            RustCryptoBackend.sign(b"not a key", scheme, b"msg"),
            Err(BackendError::InvalidKey(_))
        ));
    }
}
