//! DEP machine-info document.
//!
//! During Automated Device Enrollment the device POSTs a signed property list describing
//! itself. Once the signature checks out, the encapsulated content parses into [`MachineInfo`].

/// Device identity reported in a DEP enrollment request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct MachineInfo {
    /// Device UDID.
    pub udid: String,

    /// Hardware serial number.
    #[serde(default)]
    pub serial: Option<String>,

    /// Model identifier, e.g. `MacBookPro18,3`.
    #[serde(default)]
    pub product: Option<String>,

    /// OS build version.
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub imei: Option<String>,

    #[serde(default)]
    pub meid: Option<String>,

    /// Preferred language, e.g. `en-US`.
    #[serde(default)]
    pub language: Option<String>,
}

/// Parse a machine-info property list (XML or binary).
pub fn parse_machine_info(data: &[u8]) -> color_eyre::eyre::Result<MachineInfo> {
    use color_eyre::eyre::WrapErr as _;

    let info: MachineInfo = plist::from_bytes(data).wrap_err("failed to parse machine info")?;
    if info.udid.is_empty() {
        color_eyre::eyre::bail!("machine info has an empty UDID");
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MACHINE_INFO: &[u8] = include_bytes!("../tests/fixtures/machine_info.plist");
    const CELLULAR: &[u8] = include_bytes!("../tests/fixtures/machine_info_cellular.bplist");

    #[test]
    fn test_parse_xml() {
        let info = parse_machine_info(MACHINE_INFO).unwrap();
        assert_eq!(info.udid, "7D3F0A21-6C4B-5E8D-9F12-AB34CD56EF78");
        assert_eq!(info.serial.as_deref(), Some("C02ZK1ABMD6T"));
        assert_eq!(info.product.as_deref(), Some("MacBookPro18,3"));
        assert_eq!(info.version.as_deref(), Some("23F79"));
        assert_eq!(info.language.as_deref(), Some("en-US"));
        assert_eq!(info.imei, None);
        assert_eq!(info.meid, None);
    }

    #[test]
    fn test_parse_binary() {
        let info = parse_machine_info(CELLULAR).unwrap();
        assert_eq!(info.udid, "7D3F0A21-6C4B-5E8D-9F12-AB34CD56EF78");
        assert_eq!(info.imei.as_deref(), Some("35 209900 176148 1"));
        assert_eq!(info.meid.as_deref(), Some("35209900176148"));
    }

    #[test]
    fn test_udid_required() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>SERIAL</key>
    <string>C02ZK1ABMD6T</string>
</dict>
</plist>"#;
        assert!(parse_machine_info(xml).is_err());
    }

    #[test]
    fn test_empty_udid_rejected() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>UDID</key>
    <string></string>
</dict>
</plist>"#;
        assert!(parse_machine_info(xml).is_err());
    }

    #[test]
    fn test_not_a_plist() {
        assert!(parse_machine_info(b"\x30\x82\x01\x00").is_err());
    }
}
