//! Signer certificate lookup.

use crate::envelope::{CertificateEntry, EmbeddedCertificate, SignerIdentifier};

/// Find the embedded certificate a signer identifier refers to.
///
/// Only issuer-and-serial-number identifiers are supported; a subject key identifier resolves
/// to `None`. Both the issuer name and the serial number must match. If the envelope carries
/// duplicates, the first match wins.
pub fn resolve<'e, 'a>(
    certificates: &'e [CertificateEntry<'a>],
    sid: &SignerIdentifier<'_>,
) -> Option<&'e EmbeddedCertificate<'a>> {
    let SignerIdentifier::IssuerAndSerialNumber {
        issuer,
        serial_number,
    } = sid
    else {
        tracing::debug!("subject key identifier signers are not supported");
        return None;
    };

    certificates
        .iter()
        .filter_map(CertificateEntry::as_certificate)
        .find(|cert| {
            serial_eq(cert.parsed.raw_serial(), serial_number) && cert.parsed.issuer() == issuer
        })
}

/// Numeric equality of two two's-complement INTEGER encodings.
fn serial_eq(a: &[u8], b: &[u8]) -> bool {
    minimal_integer(a) == minimal_integer(b)
}

/// Drop redundant sign-extension octets so equal values share one encoding.
fn minimal_integer(mut bytes: &[u8]) -> &[u8] {
    while let [first, second, ..] = bytes {
        let redundant = (*first == 0x00 && second & 0x80 == 0)
            || (*first == 0xff && second & 0x80 != 0);
        if !redundant {
            break;
        }
        bytes = &bytes[1..];
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_eq_ignores_redundant_padding() {
        assert!(serial_eq(&[0x00, 0x90, 0x01], &[0x00, 0x90, 0x01]));
        assert!(serial_eq(&[0x00, 0x00, 0x10, 0x01], &[0x10, 0x01]));
        assert!(serial_eq(&[0xff, 0x80], &[0x80]));
        assert!(!serial_eq(&[0x10, 0x01], &[0x10, 0x02]));
        assert!(!serial_eq(&[0x01, 0x00], &[0x01]));
    }

    #[test]
    fn test_serial_eq_respects_sign() {
        // -128 and +128.
        assert!(!serial_eq(&[0x80], &[0x00, 0x80]));
        // -28671 and +36865.
        assert!(!serial_eq(&[0x90, 0x01], &[0x00, 0x90, 0x01]));
        assert!(!serial_eq(&[0xff], &[0x00, 0xff]));
    }

    #[test]
    fn test_subject_key_identifier_unsupported() {
        let sid = SignerIdentifier::SubjectKeyIdentifier(&[0xab; 20]);
        assert!(resolve(&[], &sid).is_none());
    }
}
