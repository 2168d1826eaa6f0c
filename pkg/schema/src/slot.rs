use md5::{Digest, Md5};

use crate::types::FieldType;

/// spec.md §4.F "Slot and prefix allocation": a stable integer slot derived
/// from `md5(field_name_normalized)`. Grounded on
/// `examples/original_source/database.cc`'s `get_slot`/`get_slot_hex`: the
/// name is upper-cased first, and the slot is the **last** 8 hex digits of
/// the 32-digit md5 digest (`std::string(md5(name), 24, 8)`), not the
/// first — it is easy to misread this as the leading digits.
pub fn slot_hex(field_name: &str) -> String {
    let normalized = field_name.to_uppercase();
    let digest = Md5::new().chain_update(normalized.as_bytes()).finalize();
    hex_digits(&digest)[24..32].to_string()
}

fn hex_digits(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Numeric slot value. `0xFFFFFFFF` is reserved (used as an ABA/"no slot"
/// sentinel elsewhere), so a collision there is nudged to `0xFFFFFFFE`.
pub fn slot(field_name: &str) -> u32 {
    let hex = slot_hex(field_name);
    let value = u32::from_str_radix(&hex, 16).expect("8 hex digits always parse as u32");
    if value == 0xFFFFFFFF {
        0xFFFFFFFE
    } else {
        value
    }
}

/// Term prefix: type tag letter followed by the slot's hex digits (spec.md
/// §4.F "Prefixes combine a type-dependent tag letter with the slot").
pub fn prefix(field_name: &str, field_type: FieldType) -> String {
    format!("{}{}", field_type.tag(), slot_hex(field_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_is_deterministic() {
        assert_eq!(slot("title"), slot("title"));
        assert_eq!(slot("title"), slot("TITLE"));
    }

    #[test]
    fn slot_differs_across_fields_in_practice() {
        assert_ne!(slot("title"), slot("body"));
    }

    #[test]
    fn prefix_embeds_type_tag() {
        let p = prefix("price", FieldType::Float);
        assert!(p.starts_with('F'));
        assert_eq!(p.len(), 9); // tag + 8 hex digits
    }
}
