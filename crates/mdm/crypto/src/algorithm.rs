//! Algorithm identifiers understood by the verifier.

use der::asn1::ObjectIdentifier;

use crate::VerificationError;

pub const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
pub const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");

pub const ID_CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
pub const ID_MESSAGE_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

pub const ID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
pub const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
pub const ID_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
pub const ID_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

pub const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
pub const SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
pub const SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub const SHA384_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
pub const SHA512_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

/// Message digest algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

const DIGESTS: [(ObjectIdentifier, DigestAlgorithm); 4] = [
    (ID_SHA1, DigestAlgorithm::Sha1),
    (ID_SHA256, DigestAlgorithm::Sha256),
    (ID_SHA384, DigestAlgorithm::Sha384),
    (ID_SHA512, DigestAlgorithm::Sha512),
];

/// Signature OIDs and the digest they fix, `None` for the bare key OID.
const RSA_SIGNATURES: [(ObjectIdentifier, Option<DigestAlgorithm>); 5] = [
    (RSA_ENCRYPTION, None),
    (SHA1_WITH_RSA, Some(DigestAlgorithm::Sha1)),
    (SHA256_WITH_RSA, Some(DigestAlgorithm::Sha256)),
    (SHA384_WITH_RSA, Some(DigestAlgorithm::Sha384)),
    (SHA512_WITH_RSA, Some(DigestAlgorithm::Sha512)),
];

impl DigestAlgorithm {
    /// Look up a digest algorithm by OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        DIGESTS
            .iter()
            .find(|(id, _)| id == oid)
            .map(|(_, alg)| *alg)
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA-1"),
            Self::Sha256 => write!(f, "SHA-256"),
            Self::Sha384 => write!(f, "SHA-384"),
            Self::Sha512 => write!(f, "SHA-512"),
        }
    }
}

/// Signature padding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaddingScheme {
    /// RSASSA-PKCS1-v1_5.
    Pkcs1v15,
}

/// Digest and padding pair a signature is checked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureScheme {
    pub padding: PaddingScheme,
    pub digest: DigestAlgorithm,
}

impl SignatureScheme {
    /// Resolve the scheme a signer-info declares.
    ///
    /// The signature algorithm may be the bare `rsaEncryption` key OID, in which case the digest
    /// algorithm decides. A combined `shaNNNWithRSAEncryption` OID must name the same digest.
    pub fn resolve(
        digest_algorithm: &ObjectIdentifier,
        signature_algorithm: &ObjectIdentifier,
    ) -> Result<Self, VerificationError> {
        let digest = DigestAlgorithm::from_oid(digest_algorithm).ok_or_else(|| {
            VerificationError::UnsupportedAlgorithm(format!("digest {digest_algorithm}"))
        })?;

        let implied = RSA_SIGNATURES
            .iter()
            .find(|(id, _)| id == signature_algorithm)
            .map(|(_, implied)| *implied)
            .ok_or_else(|| {
                VerificationError::UnsupportedAlgorithm(format!("signature {signature_algorithm}"))
            })?;

        if let Some(implied) = implied {
            if implied != digest {
                return Err(VerificationError::UnsupportedAlgorithm(format!(
                    "signature {signature_algorithm} does not match digest {digest}"
                )));
            }
        }

        Ok(Self {
            padding: PaddingScheme::Pkcs1v15,
            digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_bare_rsa_uses_digest() {
        let scheme = SignatureScheme::resolve(&ID_SHA1, &RSA_ENCRYPTION).unwrap();
        assert_eq!(scheme.digest, DigestAlgorithm::Sha1);
        assert_eq!(scheme.padding, PaddingScheme::Pkcs1v15);
    }

    #[test]
    fn test_resolve_combined_oid_must_agree() {
        assert!(SignatureScheme::resolve(&ID_SHA256, &SHA256_WITH_RSA).is_ok());
        assert!(matches!(
            SignatureScheme::resolve(&ID_SHA1, &SHA256_WITH_RSA),
            Err(VerificationError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_pss_and_ecdsa() {
        let pss = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");
        let ecdsa_sha256 = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
        for oid in [pss, ecdsa_sha256] {
            assert!(matches!(
                SignatureScheme::resolve(&ID_SHA256, &oid),
                Err(VerificationError::UnsupportedAlgorithm(_))
            ));
        }
    }

    #[test]
    fn test_unknown_digest() {
        let md5 = ObjectIdentifier::new_unwrap("1.2.840.113549.2.5");
        assert_eq!(DigestAlgorithm::from_oid(&md5), None);
    }
}
