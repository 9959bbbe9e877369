use std::fs;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, warn};

use super::keys::{PrivateKeyMaterial, PublicKeyMaterial};
use crate::canonical::{Charset, FieldSet, canonicalize};
use crate::error::{ControlCodeError, Result};

/// The only algorithm the payment network accepts for control codes.
pub const SIGNATURE_ALGORITHM: &str = "rsa-pkcs1v15-sha1";

/// Signs the canonical form of `fields` and returns the base64 control code.
pub fn sign(
    fields: &FieldSet,
    charset: Charset,
    private_key_pem: &[u8],
    passphrase: Option<&str>,
) -> Result<String> {
    let canonical = canonicalize(fields, charset)?;
    let key = PrivateKeyMaterial::from_pem(private_key_pem, passphrase)?;
    let signature = key.sign(canonical.as_bytes())?;
    debug!(
        fields = fields.len(),
        canonical_bytes = canonical.len(),
        charset = %charset,
        "generated control code"
    );
    Ok(BASE64.encode(signature))
}

/// Checks a base64 control code against the canonical form of `fields`.
///
/// Returns `Ok(false)` for a well-formed signature that does not match.
/// A signature that cannot be decoded or evaluated against the key is a
/// [`ControlCodeError::VerificationEngine`] error, never `false`.
pub fn verify(
    fields: &FieldSet,
    signature_base64: &str,
    public_key_pem: &[u8],
    charset: Charset,
) -> Result<bool> {
    let canonical = canonicalize(fields, charset)?;
    let key = PublicKeyMaterial::from_pem(public_key_pem)?;
    let signature = decode_signature(signature_base64)?;

    let valid = key.verify(canonical.as_bytes(), &signature).inspect_err(|e| {
        warn!(error = %e, "control code could not be evaluated");
    })?;
    debug!(
        fields = fields.len(),
        canonical_bytes = canonical.len(),
        valid,
        "verified control code"
    );
    Ok(valid)
}

/// Signs `fields` and verifies the result with the same PEM.
///
/// Meant for checking a key file and passphrase before going live. The
/// PEM is used for both halves, so it must contain the merchant
/// certificate next to the private key; a bare private key fails the
/// verify step with [`ControlCodeError::KeyLoad`].
pub fn round_trip_self_test(
    fields: &FieldSet,
    private_key_pem: &[u8],
    charset: Charset,
    passphrase: Option<&str>,
) -> Result<bool> {
    let control_code = sign(fields, charset, private_key_pem, passphrase)?;
    verify(fields, &control_code, private_key_pem, charset)
}

/// [`sign`] with the private key read from `private_key_path`.
pub fn sign_with_key_file(
    fields: &FieldSet,
    charset: Charset,
    private_key_path: impl AsRef<Path>,
    passphrase: Option<&str>,
) -> Result<String> {
    let pem = read_key_file(private_key_path.as_ref())?;
    sign(fields, charset, &pem, passphrase)
}

/// [`verify`] with the certificate read from `public_cert_path`.
pub fn verify_with_certificate_file(
    fields: &FieldSet,
    signature_base64: &str,
    public_cert_path: impl AsRef<Path>,
    charset: Charset,
) -> Result<bool> {
    let pem = read_key_file(public_cert_path.as_ref())?;
    verify(fields, signature_base64, &pem, charset)
}

/// [`round_trip_self_test`] against a combined key and certificate file.
pub fn self_test_with_key_file(
    fields: &FieldSet,
    private_cert_path: impl AsRef<Path>,
    charset: Charset,
    passphrase: Option<&str>,
) -> Result<bool> {
    let pem = read_key_file(private_cert_path.as_ref())?;
    round_trip_self_test(fields, &pem, charset, passphrase)
}

fn read_key_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|e| ControlCodeError::KeyLoad(format!("reading {}: {e}", path.display())))
}

// Control codes travel through HTML forms and may come back line-wrapped.
fn decode_signature(signature_base64: &str) -> Result<Vec<u8>> {
    let compact: String = signature_base64
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    BASE64.decode(compact).map_err(|e| {
        ControlCodeError::VerificationEngine(format!("malformed signature encoding: {e}"))
    })
}
