/// Key layout for Fjall partitions
///
/// Partition structure:
/// - `leads`: lead:{lead_id} -> Lead (JSON)
/// - `vendors`: vendor:{vendor_id} -> Vendor (JSON)

/// Encode a lead key: lead:{lead_id}
pub fn encode_lead_key(lead_id: &str) -> Vec<u8> {
    format!("lead:{}", lead_id).into_bytes()
}

/// Decode a lead key: lead:{lead_id} -> lead_id
pub fn decode_lead_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("lead:").map(String::from)
}

/// Encode a vendor key: vendor:{vendor_id}
pub fn encode_vendor_key(vendor_id: &str) -> Vec<u8> {
    format!("vendor:{}", vendor_id).into_bytes()
}

/// Decode a vendor key: vendor:{vendor_id} -> vendor_id
pub fn decode_vendor_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("vendor:").map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_key_encoding() {
        let key = encode_lead_key("lead_123");
        assert_eq!(key, b"lead:lead_123");
        assert_eq!(decode_lead_key(&key).unwrap(), "lead_123");
    }

    #[test]
    fn test_vendor_key_encoding() {
        let key = encode_vendor_key("v-9");
        assert_eq!(key, b"vendor:v-9");
        assert_eq!(decode_vendor_key(&key).unwrap(), "v-9");
    }

    #[test]
    fn test_decode_rejects_foreign_prefix() {
        assert!(decode_lead_key(b"vendor:v-9").is_none());
        assert!(decode_vendor_key(&[0xff, 0xfe]).is_none());
    }
}
