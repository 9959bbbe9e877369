use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::debug;
use x509_cert::Certificate;
use x509_cert::der::{DecodePem, Encode};

use crate::error::{ControlCodeError, Result};

const PRIVATE_KEY_LABELS: [&str; 3] = ["PRIVATE KEY", "ENCRYPTED PRIVATE KEY", "RSA PRIVATE KEY"];
const PUBLIC_KEY_LABELS: [&str; 3] = ["CERTIFICATE", "PUBLIC KEY", "RSA PUBLIC KEY"];

/// One `-----BEGIN <label>-----` ... `-----END <label>-----` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PemBlock<'a> {
    label: &'a str,
    text: &'a str,
}

/// Splits a PEM file into its blocks, in file order.
///
/// Text between blocks (OpenSSL "Bag Attributes", comments) is skipped, as is
/// a header whose footer never appears before the next header.
fn pem_blocks(pem: &str) -> Vec<PemBlock<'_>> {
    const BEGIN: &str = "-----BEGIN ";

    let mut blocks = Vec::new();
    let mut offset = 0;
    while let Some(found) = pem[offset..].find(BEGIN) {
        let begin = offset + found;
        let label_start = begin + BEGIN.len();
        // resume after this header if it does not open a complete block
        offset = label_start;

        let Some(label_len) = pem[label_start..].find("-----") else {
            break;
        };
        let label = &pem[label_start..label_start + label_len];
        if label.contains(['\r', '\n']) {
            continue;
        }
        let body_start = label_start + label_len + "-----".len();
        let footer = format!("-----END {label}-----");
        let Some(footer_at) = pem[body_start..].find(&footer) else {
            continue;
        };
        if pem[body_start..body_start + footer_at].contains(BEGIN) {
            continue;
        }
        let end = body_start + footer_at + footer.len();
        blocks.push(PemBlock {
            label,
            text: &pem[begin..end],
        });
        offset = end;
    }
    blocks
}

fn pem_text(pem: &[u8]) -> Result<&str> {
    std::str::from_utf8(pem)
        .map_err(|_| ControlCodeError::KeyLoad("key file is not PEM text".into()))
}

fn first_block<'a>(pem: &'a str, labels: &[&str]) -> Option<PemBlock<'a>> {
    pem_blocks(pem)
        .into_iter()
        .find(|block| labels.contains(&block.label))
}

/// Private half of a control code key pair, scoped to a single operation.
///
/// The underlying RSA key zeroizes itself when this value is dropped.
pub struct PrivateKeyMaterial {
    signing_key: SigningKey<Sha1>,
}

impl PrivateKeyMaterial {
    /// Parses the first private key block of a PEM file.
    ///
    /// `passphrase` is required for `ENCRYPTED PRIVATE KEY` blocks and
    /// ignored for unencrypted ones.
    pub fn from_pem(pem: &[u8], passphrase: Option<&str>) -> Result<Self> {
        let pem = pem_text(pem)?;
        let block = first_block(pem, &PRIVATE_KEY_LABELS).ok_or_else(|| {
            ControlCodeError::KeyLoad("no private key block found in PEM".into())
        })?;

        let private_key = match block.label {
            "ENCRYPTED PRIVATE KEY" => {
                let passphrase = passphrase.ok_or_else(|| {
                    ControlCodeError::KeyLoad(
                        "private key is encrypted but no passphrase was supplied".into(),
                    )
                })?;
                RsaPrivateKey::from_pkcs8_encrypted_pem(block.text, passphrase).map_err(|e| {
                    ControlCodeError::KeyLoad(format!(
                        "decrypting private key (wrong passphrase?): {e}"
                    ))
                })?
            }
            "RSA PRIVATE KEY" => {
                if block.text.contains("Proc-Type: 4,ENCRYPTED") {
                    return Err(ControlCodeError::KeyLoad(
                        "legacy encrypted PKCS#1 keys are not supported, convert to PKCS#8".into(),
                    ));
                }
                RsaPrivateKey::from_pkcs1_pem(block.text)
                    .map_err(|e| ControlCodeError::KeyLoad(format!("parsing PKCS#1 key: {e}")))?
            }
            _ => RsaPrivateKey::from_pkcs8_pem(block.text)
                .map_err(|e| ControlCodeError::KeyLoad(format!("parsing PKCS#8 key: {e}")))?,
        };

        debug!(
            label = block.label,
            modulus_bits = private_key.size() * 8,
            "loaded private key"
        );
        Ok(Self {
            signing_key: SigningKey::<Sha1>::new(private_key),
        })
    }

    /// RSASSA-PKCS1-v1_5 over SHA-1 of `message`. Returns raw signature bytes.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| ControlCodeError::Signing(e.to_string()))?;
        Ok(signature.to_vec())
    }

    pub fn public_key(&self) -> PublicKeyMaterial {
        let private_key: &RsaPrivateKey = self.signing_key.as_ref();
        PublicKeyMaterial::new(private_key.to_public_key())
    }
}

/// Public half of a control code key pair, scoped to a single operation.
pub struct PublicKeyMaterial {
    verifying_key: VerifyingKey<Sha1>,
}

impl PublicKeyMaterial {
    fn new(public_key: RsaPublicKey) -> Self {
        Self {
            verifying_key: VerifyingKey::<Sha1>::new(public_key),
        }
    }

    /// Parses the first certificate or public key block of a PEM file.
    ///
    /// Private key blocks are skipped, never used to derive a public key.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let pem = pem_text(pem)?;
        let block = first_block(pem, &PUBLIC_KEY_LABELS).ok_or_else(|| {
            ControlCodeError::KeyLoad("no certificate or public key block found in PEM".into())
        })?;

        let public_key = match block.label {
            "CERTIFICATE" => public_key_from_certificate(block.text)?,
            "RSA PUBLIC KEY" => RsaPublicKey::from_pkcs1_pem(block.text).map_err(|e| {
                ControlCodeError::KeyLoad(format!("parsing PKCS#1 public key: {e}"))
            })?,
            _ => RsaPublicKey::from_public_key_pem(block.text)
                .map_err(|e| ControlCodeError::KeyLoad(format!("parsing public key: {e}")))?,
        };

        let material = Self::new(public_key);
        debug!(
            label = block.label,
            modulus_bits = material.modulus_len() * 8,
            fingerprint = %material.fingerprint().unwrap_or_default(),
            "loaded public key"
        );
        Ok(material)
    }

    /// Modulus length in bytes; every valid signature has exactly this length.
    pub fn modulus_len(&self) -> usize {
        self.public_key().size()
    }

    /// Hex SHA-256 of the DER SubjectPublicKeyInfo.
    pub fn fingerprint(&self) -> Result<String> {
        let der = self
            .public_key()
            .to_public_key_der()
            .map_err(|e| ControlCodeError::KeyLoad(format!("encoding public key: {e}")))?;
        Ok(hex::encode(Sha256::digest(der.as_bytes())))
    }

    /// Checks `signature` over `message`.
    ///
    /// `Ok(false)` means a well-formed signature that does not match.
    /// Signatures the engine cannot even evaluate are errors.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool> {
        let public_key = self.public_key();
        if signature.len() != public_key.size() {
            return Err(ControlCodeError::VerificationEngine(format!(
                "signature is {} bytes, key modulus is {} bytes",
                signature.len(),
                public_key.size()
            )));
        }
        if BigUint::from_bytes_be(signature) >= *public_key.n() {
            return Err(ControlCodeError::VerificationEngine(
                "signature representative is out of range for the key modulus".into(),
            ));
        }
        let signature = Signature::try_from(signature)
            .map_err(|e| ControlCodeError::VerificationEngine(e.to_string()))?;
        Ok(self.verifying_key.verify(message, &signature).is_ok())
    }

    fn public_key(&self) -> &RsaPublicKey {
        self.verifying_key.as_ref()
    }
}

fn public_key_from_certificate(pem: &str) -> Result<RsaPublicKey> {
    let certificate = Certificate::from_pem(pem)
        .map_err(|e| ControlCodeError::KeyLoad(format!("parsing certificate: {e}")))?;
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| ControlCodeError::KeyLoad(format!("encoding certificate key: {e}")))?;
    RsaPublicKey::from_public_key_der(&spki).map_err(|e| {
        ControlCodeError::KeyLoad(format!("certificate does not carry an RSA public key: {e}"))
    })
}
