//! Signed-data verification.
//!
//! Drives decode → resolve → verify for each signer-info and returns the first signer that
//! checks out along with the content it signed.

use color_eyre::eyre::WrapErr as _;
use x509_parser::prelude::{FromDer as _, X509Certificate};

use crate::backend::{CryptoBackend, RustCryptoBackend, Verdict};
use crate::{EnvelopeError, VerificationError, decode, resolve, verify_signer_info};

/// Which signer-info entries may satisfy a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignerPolicy {
    /// Accept on the first signer-info that resolves and verifies; skip the rest.
    #[default]
    FirstValid,
    /// Only the first signer-info is considered.
    PrimaryOnly,
}

/// Verification settings supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOptions {
    pub policy: SignerPolicy,
    /// Accept SHA-1 digests. DEP devices sign with SHA-1.
    pub allow_sha1: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            policy: SignerPolicy::FirstValid,
            allow_sha1: true,
        }
    }
}

/// A signer that verified, and the content it signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// DER of the certificate whose key verified the signature.
    pub certificate: Vec<u8>,
    /// The signed content: the encapsulated content, or the detached content supplied.
    pub content: Vec<u8>,
    /// Index of the signer-info that verified.
    pub signer_index: usize,
}

impl VerifiedIdentity {
    /// Parse the signing certificate.
    pub fn parse_certificate(&self) -> color_eyre::eyre::Result<X509Certificate<'_>> {
        let (_, cert) = X509Certificate::from_der(&self.certificate)
            .wrap_err("failed to parse signer certificate")?;
        Ok(cert)
    }
}

/// Verify a DER signed-data envelope that carries its content.
pub fn verify_signed_data(
    bytes: &[u8],
    options: &VerifyOptions,
) -> Result<VerifiedIdentity, EnvelopeError> {
    verify_signed_data_with(&RustCryptoBackend, bytes, None, options)
}

/// Verify a DER signed-data envelope whose content travels separately.
pub fn verify_detached(
    bytes: &[u8],
    content: &[u8],
    options: &VerifyOptions,
) -> Result<VerifiedIdentity, EnvelopeError> {
    verify_signed_data_with(&RustCryptoBackend, bytes, Some(content), options)
}

/// Verify a DER signed-data envelope with an explicit backend.
///
/// `detached` is only consulted when the envelope carries no content of its own.
pub fn verify_signed_data_with(
    backend: &dyn CryptoBackend,
    bytes: &[u8],
    detached: Option<&[u8]>,
    options: &VerifyOptions,
) -> Result<VerifiedIdentity, EnvelopeError> {
    let envelope = decode(bytes)?;

    let content = envelope
        .encapsulated_content
        .as_deref()
        .or(detached)
        .unwrap_or_default();

    let candidates = match options.policy {
        SignerPolicy::FirstValid => envelope.signer_infos.len(),
        SignerPolicy::PrimaryOnly => envelope.signer_infos.len().min(1),
    };

    for (index, signer) in envelope.signer_infos.iter().take(candidates).enumerate() {
        let Some(certificate) = resolve(&envelope.certificates, &signer.sid) else {
            tracing::warn!(index, "no embedded certificate matches signer identifier");
            continue;
        };

        match verify_signer_info(
            backend,
            certificate,
            signer,
            &envelope.encapsulated_content_type,
            content,
            options.allow_sha1,
        ) {
            Verdict::Valid => {
                tracing::debug!(
                    index,
                    subject = %certificate.parsed.subject(),
                    "signer verified"
                );
                return Ok(VerifiedIdentity {
                    certificate: certificate.der.to_vec(),
                    content: content.to_vec(),
                    signer_index: index,
                });
            }
            Verdict::Invalid => {
                tracing::warn!(index, "signature does not verify");
            }
            Verdict::UnsupportedAlgorithm(algorithm) => {
                tracing::warn!(index, algorithm = %algorithm, "cannot check signer");
            }
        }
    }

    tracing::warn!(
        signers = envelope.signer_infos.len(),
        attempted = candidates,
        "no valid signer"
    );

    Err(VerificationError::NoValidSigner {
        attempted: candidates,
    }
    .into())
}

/// Verify the Mdm-Signature header and extract the signing certificate.
///
/// The header is a base64-encoded detached CMS signature over the request body.
pub fn verify_mdm_signature(
    signature_header: &str,
    body: &[u8],
) -> color_eyre::eyre::Result<Vec<u8>> {
    use base64::Engine as _;

    let signature_der = base64::engine::general_purpose::STANDARD
        .decode(signature_header.trim())
        .wrap_err("failed to decode Mdm-Signature base64")?;

    let identity = verify_detached(&signature_der, body, &VerifyOptions::default())
        .wrap_err("Mdm-Signature does not verify")?;

    Ok(identity.certificate)
}
