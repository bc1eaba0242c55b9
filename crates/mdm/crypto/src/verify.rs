//! Signature verification for a resolved signer.

use der::asn1::ObjectIdentifier;

use crate::algorithm::{DigestAlgorithm, SignatureScheme};
use crate::backend::{CryptoBackend, Verdict};
use crate::envelope::{EmbeddedCertificate, SignerInfo};

/// Check a signature made by `certificate`'s key over `signed_bytes`.
pub fn verify(
    backend: &dyn CryptoBackend,
    certificate: &EmbeddedCertificate<'_>,
    signature: &[u8],
    scheme: SignatureScheme,
    signed_bytes: &[u8],
) -> Verdict {
    let public_key = certificate.parsed.public_key().raw;
    backend.verify(public_key, scheme, signed_bytes, signature)
}

/// Verify one signer-info against its resolved certificate.
///
/// Without signed attributes the signature covers `content` directly. With them it covers the
/// attributes, which must carry the content type and the digest of `content`.
pub fn verify_signer_info(
    backend: &dyn CryptoBackend,
    certificate: &EmbeddedCertificate<'_>,
    signer: &SignerInfo<'_>,
    content_type: &ObjectIdentifier,
    content: &[u8],
    allow_sha1: bool,
) -> Verdict {
    let scheme =
        match SignatureScheme::resolve(&signer.digest_algorithm, &signer.signature_algorithm) {
            Ok(scheme) => scheme,
            Err(e) => return Verdict::UnsupportedAlgorithm(e.to_string()),
        };

    if scheme.digest == DigestAlgorithm::Sha1 && !allow_sha1 {
        return Verdict::UnsupportedAlgorithm("SHA-1 is disabled".to_string());
    }

    let Some(attributes) = &signer.signed_attributes else {
        return verify(backend, certificate, &signer.signature, scheme, content);
    };

    if attributes.content_type.as_ref() != Some(content_type) {
        tracing::debug!(
            expected = %content_type,
            "content-type attribute missing or mismatched"
        );
        return Verdict::Invalid;
    }

    let Some(message_digest) = attributes.message_digest else {
        tracing::debug!("message-digest attribute missing");
        return Verdict::Invalid;
    };

    // Not constant time; both values are public.
    if backend.digest(scheme.digest, content) != message_digest {
        tracing::debug!(digest = %scheme.digest, "message digest does not match content");
        return Verdict::Invalid;
    }

    verify(
        backend,
        certificate,
        &signer.signature,
        scheme,
        &attributes.signed_bytes(),
    )
}
