mod charset;
mod fields;

pub use charset::Charset;
pub use fields::FieldSet;

use std::fmt;

use crate::error::{ControlCodeError, Result};

/// Width of the decimal length prefix written before every value.
pub const LENGTH_PREFIX_WIDTH: usize = 3;

/// Longest value, in characters, the length prefix can describe.
pub const MAX_FIELD_CHARS: usize = 999;

/// Length-prefixed concatenation of a [`FieldSet`], encoded in its charset.
///
/// These are the exact bytes a control code is computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalString {
    bytes: Vec<u8>,
    charset: Charset,
}

impl CanonicalString {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// The canonical form as text, for display and debugging.
    pub fn to_text(&self) -> String {
        self.charset.decode(&self.bytes).into_owned()
    }
}

impl AsRef<[u8]> for CanonicalString {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for CanonicalString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.charset.decode(&self.bytes))
    }
}

/// Builds the canonical byte string for `fields`.
///
/// Each value contributes its character length, zero-padded to three
/// digits, followed by the value itself in `charset`. Values longer
/// than [`MAX_FIELD_CHARS`] are rejected rather than wrapped.
pub fn canonicalize(fields: &FieldSet, charset: Charset) -> Result<CanonicalString> {
    let mut bytes = Vec::new();
    for (name, value) in fields.iter() {
        let length = charset.char_len(value);
        if length > MAX_FIELD_CHARS {
            return Err(ControlCodeError::FieldTooLong {
                field: name.to_string(),
                length,
                max: MAX_FIELD_CHARS,
            });
        }
        let encoded = charset.encode(name, value)?;
        let prefix = format!("{length:0width$}", width = LENGTH_PREFIX_WIDTH);
        bytes.extend_from_slice(prefix.as_bytes());
        bytes.extend_from_slice(&encoded);
    }
    Ok(CanonicalString { bytes, charset })
}

/// Text form of [`canonicalize`], exposed for debugging payment requests.
pub fn canonical_hash(fields: &FieldSet, charset: Charset) -> Result<String> {
    canonicalize(fields, charset).map(|canonical| canonical.to_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_fields() -> FieldSet {
        FieldSet::new()
            .with("amount", "100.00")
            .with("currency", "EUR")
            .with("ref", "INV1234")
    }

    #[test]
    fn layout_is_length_prefixed() {
        let canonical = canonicalize(&payment_fields(), Charset::utf8()).unwrap();
        assert_eq!(canonical.as_bytes(), b"006100.00003EUR007INV1234");
    }

    #[test]
    fn deterministic() {
        let first = canonicalize(&payment_fields(), Charset::utf8()).unwrap();
        let second = canonicalize(&payment_fields(), Charset::utf8()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn order_changes_canonical_form() {
        let reordered = FieldSet::new()
            .with("ref", "INV1234")
            .with("currency", "EUR")
            .with("amount", "100.00");
        let original = canonicalize(&payment_fields(), Charset::utf8()).unwrap();
        let reordered = canonicalize(&reordered, Charset::utf8()).unwrap();
        assert_ne!(original, reordered);
        assert_eq!(reordered.as_bytes(), b"007INV1234003EUR006100.00");
    }

    #[test]
    fn field_names_are_not_signed() {
        let renamed = FieldSet::new()
            .with("VK_AMOUNT", "100.00")
            .with("VK_CURR", "EUR")
            .with("VK_REF", "INV1234");
        assert_eq!(
            canonicalize(&renamed, Charset::utf8()).unwrap(),
            canonicalize(&payment_fields(), Charset::utf8()).unwrap(),
        );
    }

    #[test]
    fn empty_value_gets_zero_prefix() {
        let fields = FieldSet::new().with("VK_MSG", "").with("VK_ID", "1");
        let canonical = canonicalize(&fields, Charset::utf8()).unwrap();
        assert_eq!(canonical.as_bytes(), b"0000011");
    }

    #[test]
    fn empty_field_set_is_empty_string() {
        let canonical = canonicalize(&FieldSet::new(), Charset::utf8()).unwrap();
        assert!(canonical.is_empty());
    }

    #[test]
    fn max_length_value_is_accepted() {
        let fields = FieldSet::new().with("VK_MSG", "x".repeat(MAX_FIELD_CHARS));
        let canonical = canonicalize(&fields, Charset::utf8()).unwrap();
        assert_eq!(&canonical.as_bytes()[..3], b"999");
        assert_eq!(canonical.len(), 3 + MAX_FIELD_CHARS);
    }

    #[test]
    fn overlong_value_is_rejected() {
        let fields = FieldSet::new()
            .with("VK_ID", "1")
            .with("VK_MSG", "x".repeat(MAX_FIELD_CHARS + 1));
        let err = canonicalize(&fields, Charset::utf8()).unwrap_err();
        match err {
            ControlCodeError::FieldTooLong { field, length, max } => {
                assert_eq!(field, "VK_MSG");
                assert_eq!(length, 1000);
                assert_eq!(max, 999);
            }
            other => panic!("expected FieldTooLong, got {:?}", other),
        }
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        // 999 two-byte characters: 1998 bytes, still within the limit.
        let fields = FieldSet::new().with("VK_MSG", "ā".repeat(MAX_FIELD_CHARS));
        let canonical = canonicalize(&fields, Charset::utf8()).unwrap();
        assert_eq!(&canonical.as_bytes()[..3], b"999");
        assert_eq!(canonical.len(), 3 + 2 * MAX_FIELD_CHARS);
    }

    #[test]
    fn multibyte_values_prefix_character_count() {
        let fields = FieldSet::new().with("VK_MSG", "Rēķins nr. 42");
        let canonical = canonicalize(&fields, Charset::utf8()).unwrap();
        assert_eq!(canonical.as_bytes(), "013Rēķins nr. 42".as_bytes());
    }

    #[test]
    fn single_byte_charset_encodes_values() {
        let charset = Charset::for_label("windows-1257").unwrap();
        let fields = FieldSet::new().with("VK_MSG", "Rēķins");
        let canonical = canonicalize(&fields, charset).unwrap();
        assert_eq!(canonical.as_bytes(), b"006R\xe7\xedins");
        assert_eq!(canonical.to_text(), "006Rēķins");
    }

    #[test]
    fn unrepresentable_value_is_an_encoding_error() {
        let charset = Charset::for_label("windows-1257").unwrap();
        let fields = FieldSet::new().with("VK_NAME", "Жанна");
        let err = canonicalize(&fields, charset).unwrap_err();
        assert!(matches!(err, ControlCodeError::Encoding { .. }));
    }

    #[test]
    fn canonical_hash_is_text_form() {
        let hash = canonical_hash(&payment_fields(), Charset::utf8()).unwrap();
        assert_eq!(hash, "006100.00003EUR007INV1234");
    }
}
