use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use encoding_rs::Encoding;

use crate::error::{ControlCodeError, Result};

/// Character encoding the field values are declared in.
///
/// Resolved from a WHATWG label (`"UTF-8"`, `"ISO-8859-13"`,
/// `"windows-1257"`, ...). Only ASCII-compatible encodings are accepted:
/// the length prefix is written as ASCII digits and must keep that byte
/// layout in the encoded output.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Charset(&'static Encoding);

impl Charset {
    pub fn utf8() -> Self {
        Self(encoding_rs::UTF_8)
    }

    pub fn for_label(label: &str) -> Result<Self> {
        let encoding = Encoding::for_label_no_replacement(label.trim().as_bytes())
            .ok_or_else(|| ControlCodeError::UnsupportedEncoding(label.to_string()))?;
        if !encoding.is_ascii_compatible() {
            return Err(ControlCodeError::UnsupportedEncoding(format!(
                "{label} (not ASCII-compatible)"
            )));
        }
        Ok(Self(encoding))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Number of characters in `value`, as the payment network counts them.
    ///
    /// The count is in Unicode scalar values for every accepted charset. For
    /// single-byte charsets that equals the encoded byte count.
    pub fn char_len(&self, value: &str) -> usize {
        value.chars().count()
    }

    /// Encodes one field value, rejecting characters the charset cannot carry.
    pub fn encode<'a>(&self, field: &str, value: &'a str) -> Result<Cow<'a, [u8]>> {
        let (bytes, _, unmappable) = self.0.encode(value);
        if unmappable {
            return Err(ControlCodeError::Encoding {
                field: field.to_string(),
                encoding: self.name(),
            });
        }
        Ok(bytes)
    }

    pub(crate) fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        self.0.decode_without_bom_handling(bytes).0
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::utf8()
    }
}

impl FromStr for Charset {
    type Err = ControlCodeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::for_label(s)
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Charset").field(&self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_common_labels() {
        assert_eq!(Charset::for_label("utf-8").unwrap(), Charset::utf8());
        assert_eq!(Charset::for_label("UTF8").unwrap(), Charset::utf8());
        assert_eq!(Charset::for_label("windows-1257").unwrap().name(), "windows-1257");
        assert_eq!(Charset::for_label("ISO-8859-13").unwrap().name(), "ISO-8859-13");
    }

    #[test]
    fn rejects_unknown_label() {
        let err = Charset::for_label("klingon").unwrap_err();
        assert!(matches!(err, ControlCodeError::UnsupportedEncoding(_)));
    }

    #[test]
    fn rejects_non_ascii_compatible_encodings() {
        for label in ["utf-16le", "utf-16be", "iso-2022-jp"] {
            let err = Charset::for_label(label).unwrap_err();
            assert!(matches!(err, ControlCodeError::UnsupportedEncoding(_)), "{label}");
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(Charset::utf8().char_len("Rēķins"), 6);
        assert_eq!("Rēķins".len(), 8);
    }

    #[test]
    fn char_len_matches_single_byte_encoded_len() {
        let charset = Charset::for_label("windows-1257").unwrap();
        let encoded = charset.encode("ref", "Rēķins").unwrap();
        assert_eq!(charset.char_len("Rēķins"), encoded.len());
        assert_eq!(charset.char_len("Rēķins"), Charset::utf8().char_len("Rēķins"));
    }

    #[test]
    fn encodes_baltic_text_in_single_byte_charset() {
        let charset = Charset::for_label("windows-1257").unwrap();
        let bytes = charset.encode("VK_MSG", "Rēķins").unwrap();
        assert_eq!(bytes.as_ref(), b"R\xe7\xedins");
    }

    #[test]
    fn unmappable_character_is_an_encoding_error() {
        let charset = Charset::for_label("windows-1257").unwrap();
        let err = charset.encode("VK_NAME", "Жанна").unwrap_err();
        match err {
            ControlCodeError::Encoding { field, encoding } => {
                assert_eq!(field, "VK_NAME");
                assert_eq!(encoding, "windows-1257");
            }
            other => panic!("expected Encoding, got {:?}", other),
        }
    }

    #[test]
    fn utf8_is_borrowed_as_is() {
        let bytes = Charset::utf8().encode("f", "ēķ").unwrap();
        assert!(matches!(bytes, Cow::Borrowed(_)));
    }
}
