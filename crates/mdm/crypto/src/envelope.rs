//! CMS signed-data envelope decoding (RFC 5652 §5).
//!
//! Envelopes may arrive in BER, so indefinite lengths and constructed strings are accepted.
//! Decoding borrows from the input buffer: signed attributes are always a slice of the
//! received bytes, never a re-encoding. Encapsulated content is borrowed too, unless it was
//! sent as a constructed OCTET STRING and its segments had to be joined.

use std::borrow::Cow;

use der::Decode as _;
use der::asn1::{ObjectIdentifier, OctetStringRef};
use x509_parser::prelude::{FromDer as _, X509Certificate, X509Name};

use crate::DecodeError;
use crate::algorithm::{ID_CONTENT_TYPE, ID_MESSAGE_DIGEST, ID_SIGNED_DATA};

/// Decoded signed-data envelope.
#[derive(Debug, Clone)]
pub struct SignedEnvelope<'a> {
    /// Outer content type. Always signed-data once decoded.
    pub content_type: ObjectIdentifier,
    /// Embedded certificate set, in encoded order.
    pub certificates: Vec<CertificateEntry<'a>>,
    /// Certificate entries that failed to parse and were skipped.
    pub rejected_certificates: Vec<DecodeError>,
    /// Signer-info entries, in encoded order.
    pub signer_infos: Vec<SignerInfo<'a>>,
    /// Content type of the encapsulated content.
    pub encapsulated_content_type: ObjectIdentifier,
    /// Encapsulated content octets, `None` when the signature is detached.
    pub encapsulated_content: Option<Cow<'a, [u8]>>,
}

impl<'a> SignedEnvelope<'a> {
    /// The encapsulated content, empty when detached.
    pub fn content(&self) -> &[u8] {
        self.encapsulated_content.as_deref().unwrap_or_default()
    }

    /// Iterate over the plain certificates, skipping other formats.
    pub fn plain_certificates(&self) -> impl Iterator<Item = &EmbeddedCertificate<'a>> {
        self.certificates.iter().filter_map(CertificateEntry::as_certificate)
    }
}

/// An entry of the `CertificateSet`.
#[derive(Debug, Clone)]
pub enum CertificateEntry<'a> {
    /// X.509 certificate.
    Certificate(EmbeddedCertificate<'a>),
    /// Extended, attribute, or other certificate format, identified by its context tag.
    Other { tag_number: u8 },
}

impl<'a> CertificateEntry<'a> {
    /// The plain certificate, if this entry is one.
    pub fn as_certificate(&self) -> Option<&EmbeddedCertificate<'a>> {
        match self {
            Self::Certificate(cert) => Some(cert),
            Self::Other { .. } => None,
        }
    }
}

/// X.509 certificate carried inside the envelope.
#[derive(Debug, Clone)]
pub struct EmbeddedCertificate<'a> {
    /// DER exactly as embedded.
    pub der: &'a [u8],
    /// Parsed certificate.
    pub parsed: X509Certificate<'a>,
}

/// Claim naming the certificate that produced a signature.
#[derive(Debug, Clone, PartialEq)]
pub enum SignerIdentifier<'a> {
    IssuerAndSerialNumber {
        issuer: X509Name<'a>,
        /// INTEGER content octets.
        serial_number: &'a [u8],
    },
    SubjectKeyIdentifier(&'a [u8]),
}

/// A `SignerInfo` record.
#[derive(Debug, Clone)]
pub struct SignerInfo<'a> {
    pub sid: SignerIdentifier<'a>,
    pub digest_algorithm: ObjectIdentifier,
    pub signed_attributes: Option<SignedAttributes<'a>>,
    pub signature_algorithm: ObjectIdentifier,
    pub signature: Cow<'a, [u8]>,
}

/// Signed attributes of a signer-info.
#[derive(Debug, Clone)]
pub struct SignedAttributes<'a> {
    /// The `[0] IMPLICIT` element as received, header included.
    pub raw: &'a [u8],
    /// Value of the `content-type` attribute.
    pub content_type: Option<ObjectIdentifier>,
    /// Value of the `message-digest` attribute.
    pub message_digest: Option<&'a [u8]>,
}

impl SignedAttributes<'_> {
    /// The bytes the signature covers: the received encoding re-tagged as `SET OF`.
    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut bytes = self.raw.to_vec();
        if let Some(tag) = bytes.first_mut() {
            *tag = SET;
        }
        bytes
    }
}

const INTEGER: u8 = 0x02;
const OCTET_STRING: u8 = 0x04;
const OBJECT_IDENTIFIER: u8 = 0x06;
const SEQUENCE: u8 = 0x30;
const SET: u8 = 0x31;

const CONSTRUCTED: u8 = 0x20;
const CONTEXT_SPECIFIC: u8 = 0x80;
const CLASS_MASK: u8 = 0xc0;
const NUMBER_MASK: u8 = 0x1f;

/// Nesting limit for indefinite-length and constructed string values.
const MAX_DEPTH: usize = 32;

/// Element of a constructed value along with its complete encoding.
#[derive(Debug, Clone, Copy)]
struct Element<'a> {
    /// Identifier octet.
    identifier: u8,
    /// Contents octets, without the end-of-contents marker of an indefinite length.
    value: &'a [u8],
    raw: &'a [u8],
}

impl<'a> Element<'a> {
    fn context_number(&self) -> Option<u8> {
        (self.identifier & CLASS_MASK == CONTEXT_SPECIFIC)
            .then_some(self.identifier & NUMBER_MASK)
    }

    fn is_context(&self, number: u8) -> bool {
        self.context_number() == Some(number)
    }

    fn expect(self, identifier: u8, what: &str) -> Result<Self, DecodeError> {
        if self.identifier == identifier {
            Ok(self)
        } else {
            Err(DecodeError::MalformedStructure(format!(
                "{what}: expected tag 0x{identifier:02x}, found 0x{:02x}",
                self.identifier
            )))
        }
    }

    /// Contents of an OCTET STRING, joining the segments of a constructed encoding.
    fn octets(&self, what: &str) -> Result<Cow<'a, [u8]>, DecodeError> {
        self.octets_at(what, 0)
    }

    fn octets_at(&self, what: &str, depth: usize) -> Result<Cow<'a, [u8]>, DecodeError> {
        if self.identifier == OCTET_STRING {
            return Ok(Cow::Borrowed(self.value));
        }
        if self.identifier != OCTET_STRING | CONSTRUCTED {
            return Err(DecodeError::MalformedStructure(format!(
                "{what}: expected OCTET STRING, found tag 0x{:02x}",
                self.identifier
            )));
        }
        if depth >= MAX_DEPTH {
            return Err(DecodeError::MalformedStructure(format!(
                "{what}: nesting too deep"
            )));
        }

        let mut joined = Vec::new();
        let mut segments = Fields::new(self.value);
        while !segments.is_empty() {
            let segment = segments.next(what)?.octets_at(what, depth + 1)?;
            joined.extend_from_slice(&segment);
        }
        Ok(Cow::Owned(joined))
    }
}

/// Read one BER element from the front of `input`.
///
/// Definite and indefinite lengths are accepted; the element's `raw` slice tells the caller
/// how much input it spans.
fn read_element(input: &[u8], depth: usize) -> Result<Element<'_>, String> {
    let [identifier, first, rest @ ..] = input else {
        return Err("truncated header".into());
    };
    let identifier = *identifier;
    if identifier == 0 {
        return Err("unexpected end-of-contents".into());
    }
    if identifier & NUMBER_MASK == NUMBER_MASK {
        return Err("high tag numbers are not supported".into());
    }

    let (header_len, length) = match *first {
        0x80 => (2, None),
        n if n < 0x80 => (2, Some(usize::from(n))),
        n => {
            let count = usize::from(n & 0x7f);
            if count > 4 {
                return Err(format!("length of {count} octets is too large"));
            }
            let octets = rest.get(..count).ok_or("truncated length")?;
            let length = octets
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
            (2 + count, Some(length))
        }
    };

    let (value, end) = match length {
        Some(length) => {
            let end = header_len
                .checked_add(length)
                .filter(|&end| end <= input.len())
                .ok_or("length exceeds input")?;
            (&input[header_len..end], end)
        }
        None => {
            if identifier & CONSTRUCTED == 0 {
                return Err("indefinite length on a primitive value".into());
            }
            if depth >= MAX_DEPTH {
                return Err("nesting too deep".into());
            }
            let mut pos = header_len;
            loop {
                let remaining = &input[pos..];
                if remaining.starts_with(&[0x00, 0x00]) {
                    break (&input[header_len..pos], pos + 2);
                }
                pos += read_element(remaining, depth + 1)?.raw.len();
            }
        }
    };

    Ok(Element {
        identifier,
        value,
        raw: &input[..end],
    })
}

/// Sequential reader over the contents of a constructed value.
struct Fields<'a> {
    remaining: &'a [u8],
}

impl<'a> Fields<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { remaining: input }
    }

    fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    fn next(&mut self, what: &str) -> Result<Element<'a>, DecodeError> {
        if self.is_empty() {
            return Err(DecodeError::MalformedStructure(format!("{what}: missing")));
        }
        let element = read_element(self.remaining, 0)
            .map_err(|e| DecodeError::malformed(what, e))?;
        self.remaining = &self.remaining[element.raw.len()..];
        Ok(element)
    }

    fn next_tagged(&mut self, identifier: u8, what: &str) -> Result<Element<'a>, DecodeError> {
        self.next(what)?.expect(identifier, what)
    }

    fn next_oid(&mut self, what: &str) -> Result<ObjectIdentifier, DecodeError> {
        let element = self.next_tagged(OBJECT_IDENTIFIER, what)?;
        ObjectIdentifier::from_bytes(element.value)
            .map_err(|e| DecodeError::malformed(what, e))
    }

    fn finish(&self, what: &str) -> Result<(), DecodeError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::MalformedStructure(format!(
                "{what}: unexpected trailing data"
            )))
        }
    }
}

/// Decode a BER or DER signed-data `ContentInfo`.
///
/// The outer content type is checked before anything else is parsed. Malformed certificate
/// entries are skipped and recorded in [`SignedEnvelope::rejected_certificates`]; any other
/// structural problem is fatal.
pub fn decode(bytes: &[u8]) -> Result<SignedEnvelope<'_>, DecodeError> {
    let mut outer = Fields::new(bytes);
    let content_info = outer.next_tagged(SEQUENCE, "content info")?;
    outer.finish("content info")?;

    let mut fields = Fields::new(content_info.value);
    let content_type = fields.next_oid("content type")?;
    if content_type != ID_SIGNED_DATA {
        return Err(DecodeError::UnsupportedContentType {
            found: content_type,
        });
    }

    let explicit = fields.next("content")?;
    if !explicit.is_context(0) {
        return Err(DecodeError::MalformedStructure(format!(
            "content: expected [0], found tag 0x{:02x}",
            explicit.identifier
        )));
    }
    fields.finish("content info")?;

    let mut inner = Fields::new(explicit.value);
    let signed_data = inner.next_tagged(SEQUENCE, "signed data")?;
    inner.finish("content")?;

    decode_signed_data(content_type, signed_data.value)
}

fn decode_signed_data(
    content_type: ObjectIdentifier,
    input: &[u8],
) -> Result<SignedEnvelope<'_>, DecodeError> {
    let mut fields = Fields::new(input);
    fields.next_tagged(INTEGER, "signed data version")?;
    fields.next_tagged(SET, "digest algorithms")?;

    let encap = fields.next_tagged(SEQUENCE, "encapsulated content info")?;
    let (encapsulated_content_type, encapsulated_content) = decode_encapsulated(encap.value)?;

    let mut next = fields.next("signer infos")?;

    let (certificates, rejected_certificates) = if next.is_context(0) {
        let decoded = decode_certificates(next.value)?;
        next = fields.next("signer infos")?;
        decoded
    } else {
        (Vec::new(), Vec::new())
    };

    // Revocation information is not used.
    if next.is_context(1) {
        next = fields.next("signer infos")?;
    }

    let signer_set = next.expect(SET, "signer infos")?;
    fields.finish("signed data")?;

    let mut signer_infos = Vec::new();
    let mut signers = Fields::new(signer_set.value);
    while !signers.is_empty() {
        let element = signers.next_tagged(SEQUENCE, "signer info")?;
        signer_infos.push(decode_signer_info(element.value)?);
    }

    tracing::debug!(
        certificates = certificates.len(),
        rejected = rejected_certificates.len(),
        signers = signer_infos.len(),
        detached = encapsulated_content.is_none(),
        "decoded signed-data envelope"
    );

    Ok(SignedEnvelope {
        content_type,
        certificates,
        rejected_certificates,
        signer_infos,
        encapsulated_content_type,
        encapsulated_content,
    })
}

fn decode_encapsulated(
    input: &[u8],
) -> Result<(ObjectIdentifier, Option<Cow<'_, [u8]>>), DecodeError> {
    let mut fields = Fields::new(input);
    let content_type = fields.next_oid("encapsulated content type")?;

    if fields.is_empty() {
        return Ok((content_type, None));
    }

    let explicit = fields.next("encapsulated content")?;
    if !explicit.is_context(0) {
        return Err(DecodeError::MalformedStructure(format!(
            "encapsulated content: expected [0], found tag 0x{:02x}",
            explicit.identifier
        )));
    }
    fields.finish("encapsulated content info")?;

    let mut inner = Fields::new(explicit.value);
    let content = inner
        .next("encapsulated content")?
        .octets("encapsulated content")?;
    inner.finish("encapsulated content")?;

    Ok((content_type, Some(content)))
}

fn decode_certificates(
    input: &[u8],
) -> Result<(Vec<CertificateEntry<'_>>, Vec<DecodeError>), DecodeError> {
    let mut certificates = Vec::new();
    let mut rejected = Vec::new();
    let mut fields = Fields::new(input);

    let mut index = 0;
    while !fields.is_empty() {
        let element = fields.next("certificate")?;

        if element.identifier == SEQUENCE {
            match X509Certificate::from_der(element.raw) {
                Ok((_, parsed)) => certificates.push(CertificateEntry::Certificate(
                    EmbeddedCertificate {
                        der: element.raw,
                        parsed,
                    },
                )),
                Err(e) => {
                    let err = DecodeError::MalformedCertificate {
                        index,
                        reason: e.to_string(),
                    };
                    tracing::warn!(index, error = %err, "skipping malformed certificate");
                    rejected.push(err);
                }
            }
        } else if let Some(tag_number) = element.context_number() {
            tracing::debug!(index, tag = tag_number, "skipping non-X.509 certificate");
            certificates.push(CertificateEntry::Other { tag_number });
        } else {
            let err = DecodeError::MalformedCertificate {
                index,
                reason: format!("unexpected tag 0x{:02x}", element.identifier),
            };
            tracing::warn!(index, error = %err, "skipping malformed certificate");
            rejected.push(err);
        }

        index += 1;
    }

    Ok((certificates, rejected))
}

fn decode_signer_info(input: &[u8]) -> Result<SignerInfo<'_>, DecodeError> {
    let mut fields = Fields::new(input);
    fields.next_tagged(INTEGER, "signer info version")?;

    let sid = decode_signer_identifier(fields.next("signer identifier")?)?;
    let digest_algorithm = decode_algorithm(fields.next("digest algorithm")?, "digest algorithm")?;

    let mut next = fields.next("signature algorithm")?;
    let signed_attributes = if next.is_context(0) {
        let attrs = decode_signed_attributes(next)?;
        next = fields.next("signature algorithm")?;
        Some(attrs)
    } else {
        None
    };

    let signature_algorithm = decode_algorithm(next, "signature algorithm")?;
    let signature = fields.next("signature")?.octets("signature")?;

    // Unsigned attributes are not used.
    if !fields.is_empty() {
        let unsigned = fields.next("unsigned attributes")?;
        if !unsigned.is_context(1) {
            return Err(DecodeError::MalformedStructure(format!(
                "unsigned attributes: expected [1], found tag 0x{:02x}",
                unsigned.identifier
            )));
        }
    }
    fields.finish("signer info")?;

    Ok(SignerInfo {
        sid,
        digest_algorithm,
        signed_attributes,
        signature_algorithm,
        signature,
    })
}

fn decode_signer_identifier(element: Element<'_>) -> Result<SignerIdentifier<'_>, DecodeError> {
    if element.is_context(0) {
        return Ok(SignerIdentifier::SubjectKeyIdentifier(element.value));
    }

    let element = element.expect(SEQUENCE, "issuer and serial number")?;
    let mut fields = Fields::new(element.value);

    let issuer_element = fields.next_tagged(SEQUENCE, "issuer")?;
    let (_, issuer) = X509Name::from_der(issuer_element.raw)
        .map_err(|e| DecodeError::malformed("issuer", e))?;
    let serial_number = fields.next_tagged(INTEGER, "serial number")?.value;
    fields.finish("issuer and serial number")?;

    Ok(SignerIdentifier::IssuerAndSerialNumber {
        issuer,
        serial_number,
    })
}

fn decode_algorithm(element: Element<'_>, what: &str) -> Result<ObjectIdentifier, DecodeError> {
    let element = element.expect(SEQUENCE, what)?;
    // Parameters are ignored; only PKCS#1 v1.5 is verified and it takes none.
    Fields::new(element.value).next_oid(what)
}

fn decode_signed_attributes(element: Element<'_>) -> Result<SignedAttributes<'_>, DecodeError> {
    let mut content_type = None;
    let mut message_digest = None;

    let mut attributes = Fields::new(element.value);
    while !attributes.is_empty() {
        let attribute = attributes.next_tagged(SEQUENCE, "attribute")?;
        let mut fields = Fields::new(attribute.value);
        let attr_type = fields.next_oid("attribute type")?;
        let values = fields.next_tagged(SET, "attribute values")?;
        fields.finish("attribute")?;

        // Signed attributes are DER. Both are single-valued; `from_der` rejects a second value.
        if attr_type == ID_CONTENT_TYPE {
            let oid = ObjectIdentifier::from_der(values.value)
                .map_err(|e| DecodeError::malformed("content-type attribute", e))?;
            content_type = Some(oid);
        } else if attr_type == ID_MESSAGE_DIGEST {
            let digest = OctetStringRef::from_der(values.value)
                .map_err(|e| DecodeError::malformed("message-digest attribute", e))?;
            message_digest = Some(digest.as_bytes());
        }
    }

    Ok(SignedAttributes {
        raw: element.raw,
        content_type,
        message_digest,
    })
}
