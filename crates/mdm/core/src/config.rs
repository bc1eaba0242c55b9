//! Enrollment configuration.

use color_eyre::eyre::WrapErr as _;

/// Values the enrollment endpoints need, resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EnrollmentConfig {
    /// Reverse-DNS prefix for payload identifiers, e.g. `com.example.mdm`.
    pub payload_prefix: String,
    /// Hostname devices use to reach the server.
    pub public_hostname: String,
    pub port: u16,
    /// APNs push certificate, PEM encoded.
    pub push_certificate_pem: String,
}

impl EnrollmentConfig {
    /// Check that every value needed to enroll a device is present.
    pub fn validate(&self) -> color_eyre::eyre::Result<()> {
        if self.payload_prefix.trim().is_empty() {
            color_eyre::eyre::bail!("enrollment configuration has no payload prefix");
        }
        if self.public_hostname.trim().is_empty() {
            color_eyre::eyre::bail!("enrollment configuration has no public hostname");
        }
        if self.port == 0 {
            color_eyre::eyre::bail!("enrollment configuration has no port");
        }
        self.push_topic()?;
        Ok(())
    }

    /// APNs topic from the push certificate's UID attribute.
    pub fn push_topic(&self) -> color_eyre::eyre::Result<String> {
        let der = mdm_crypto::parse_pem_cert(&self.push_certificate_pem)
            .wrap_err("invalid push certificate")?;
        mdm_crypto::extract_topic_from_cert(&der).wrap_err("invalid push certificate")
    }

    /// Payload identifier under the configured prefix.
    pub fn payload_identifier(&self, suffix: &str) -> String {
        format!("{}.{}", self.payload_prefix, suffix)
    }

    /// MDM command endpoint.
    pub fn server_url(&self) -> String {
        format!("https://{}:{}/mdm", self.public_hostname, self.port)
    }

    /// MDM check-in endpoint.
    pub fn check_in_url(&self) -> String {
        format!("https://{}:{}/checkin", self.public_hostname, self.port)
    }
}
