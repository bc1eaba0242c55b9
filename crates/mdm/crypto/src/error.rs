//! Error types for signed-data decoding and verification.

use der::asn1::ObjectIdentifier;

/// Failure to decode a signed-data envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The outer content type is not signed-data.
    #[error("unsupported content type {found}, expected signed-data")]
    UnsupportedContentType {
        /// Content type found in the outer ContentInfo.
        found: ObjectIdentifier,
    },

    /// The bytes do not parse as a signed-data envelope.
    #[error("malformed signed-data envelope: {0}")]
    MalformedStructure(String),

    /// One embedded certificate could not be parsed.
    ///
    /// Recorded on the envelope and skipped; never returned from [`crate::decode`].
    #[error("malformed certificate at index {index}: {reason}")]
    MalformedCertificate {
        /// Position of the entry in the certificate set.
        index: usize,
        /// Parser error.
        reason: String,
    },
}

impl DecodeError {
    pub(crate) fn malformed(what: &str, err: impl std::fmt::Display) -> Self {
        Self::MalformedStructure(format!("{what}: {err}"))
    }
}

/// Failure to verify a signer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// The digest, padding, signature, or key algorithm is not implemented.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature was checked and does not match.
    #[error("invalid signature")]
    InvalidSignature,

    /// No signer-info both resolved to a certificate and verified.
    #[error("no valid signer among {attempted} signer-info entries")]
    NoValidSigner {
        /// Number of signer-info entries considered.
        attempted: usize,
    },
}

/// Terminal failure of a verification request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// The envelope could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The envelope decoded but no signer verified.
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

/// Failure inside a [`crate::CryptoBackend`] signing operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The private key could not be decoded.
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// The signing primitive failed.
    #[error("signing failed: {0}")]
    Signing(String),
}
