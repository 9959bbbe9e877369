//! Control codes for the "Pizza" bank-link payment protocol.
//!
//! Payment fields are canonicalized into a length-prefixed string, which is
//! signed with the merchant's RSA key (PKCS#1 v1.5, SHA-1) and verified
//! against the counterparty's certificate.

pub mod canonical;
pub mod error;
pub mod signing;

pub use canonical::{
    CanonicalString, Charset, FieldSet, LENGTH_PREFIX_WIDTH, MAX_FIELD_CHARS, canonical_hash,
    canonicalize,
};
pub use error::{ControlCodeError, Result};
pub use signing::{
    PrivateKeyMaterial, PublicKeyMaterial, SIGNATURE_ALGORITHM, round_trip_self_test,
    self_test_with_key_file, sign, sign_with_key_file, verify, verify_with_certificate_file,
};
