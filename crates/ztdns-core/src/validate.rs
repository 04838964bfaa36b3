//! Name normalization and address validation
//!
//! Device names become the leftmost label of a hostname under the zone
//! suffix. Both sides of every name comparison go through
//! [`normalize_record_name`], so a provider returning `Laptop-01.Example.com.`
//! still matches the computed `laptop-01.example.com`.

use crate::error::{Error, Result};

/// Maximum length of a full domain name (RFC 1035)
const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label (RFC 1035)
const MAX_LABEL_LEN: usize = 63;

/// Normalize a stored or computed record name for comparison
///
/// Lowercases and strips a single trailing root dot.
pub fn normalize_record_name(name: &str) -> String {
    let name = name.trim();
    name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase()
}

/// Build the fully-qualified hostname for a device
///
/// The device name is trimmed and lowercased and must form a single valid
/// DNS label. The zone suffix is normalized the same way record names are.
pub fn qualified_name(device_name: &str, zone_suffix: &str) -> Result<String> {
    let label = device_name.trim().to_ascii_lowercase();
    validate_label(&label)?;

    let zone = normalize_record_name(zone_suffix);
    if zone.is_empty() {
        return Err(Error::invalid_input("Zone suffix cannot be empty"));
    }

    let fqdn = format!("{}.{}", label, zone);
    if fqdn.len() > MAX_NAME_LEN {
        return Err(Error::invalid_input(format!(
            "Hostname too long: {} chars (max {}). Got: {}",
            fqdn.len(),
            MAX_NAME_LEN,
            fqdn
        )));
    }

    Ok(fqdn)
}

/// Validate a single DNS label
fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(Error::invalid_input("Device name cannot be empty"));
    }

    if label.len() > MAX_LABEL_LEN {
        return Err(Error::invalid_input(format!(
            "Label too long: {} chars (max {}). Label: '{}'",
            label.len(),
            MAX_LABEL_LEN,
            label
        )));
    }

    if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(Error::invalid_input(format!(
            "Label contains invalid characters. Label: '{}'. \
            Valid: alphanumeric and hyphen only.",
            label
        )));
    }

    if label.starts_with('-') || label.ends_with('-') {
        return Err(Error::invalid_input(format!(
            "Label cannot start or end with hyphen. Label: '{}'",
            label
        )));
    }

    Ok(())
}

/// Strict IPv4 literal check
///
/// Exactly four dot-separated decimal octets, each 0-255, with no sign,
/// whitespace or leading zero (`"01"` is rejected, `"0"` is fine).
pub fn is_ipv4_literal(candidate: &str) -> bool {
    let mut octets = 0;
    for part in candidate.split('.') {
        octets += 1;
        if octets > 4 || part.is_empty() || part.len() > 3 {
            return false;
        }
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        if part.len() > 1 && part.starts_with('0') {
            return false;
        }
        match part.parse::<u16>() {
            Ok(value) if value <= 255 => {}
            _ => return false,
        }
    }
    octets == 4
}
