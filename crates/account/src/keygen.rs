//! Account key generation and decoding
//!
//! Keys are serialized in the traditional per-algorithm PEM formats: PKCS#1
//! (`RSA PRIVATE KEY`) for RSA and SEC1 (`EC PRIVATE KEY`) for elliptic
//! curves.

use std::fmt;

use pem::{EncodeConfig, LineEnding, Pem};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use tracing::debug;

use crate::error::AccountError;
use acme_account_config::{EcCurve, KeyFamily, KeyTypeConfig};

/// PEM tag for PKCS#1 RSA keys
pub const RSA_PEM_TAG: &str = "RSA PRIVATE KEY";

/// PEM tag for SEC1 EC keys
pub const EC_PEM_TAG: &str = "EC PRIVATE KEY";

// Named curve OIDs as they appear in SEC1 `parameters`
const OID_P224: &str = "1.3.132.0.33";
const OID_P256: &str = "1.2.840.10045.3.1.7";
const OID_P384: &str = "1.3.132.0.34";
const OID_P521: &str = "1.3.132.0.35";

/// A freshly generated account key
pub struct GeneratedKey {
    /// PEM serialization, exactly as it should be persisted
    pub pem: String,
    /// In-memory signing handle for the same key
    pub signer: AccountSigner,
}

impl fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

/// Generate a new account key
///
/// EC sizes outside {224, 256, 384, 521} produce a P-384 key, see
/// [`EcCurve::from_key_size`]. RSA sizes are passed through unchecked, so a
/// size the RSA routine can't handle surfaces as
/// [`AccountError::KeyGeneration`].
pub fn generate(config: &KeyTypeConfig) -> Result<GeneratedKey, AccountError> {
    let signer = match config.family {
        KeyFamily::Rsa => {
            let bits = usize::try_from(config.size).map_err(|e| AccountError::KeyGeneration {
                key_type: *config,
                message: e.to_string(),
            })?;
            let key =
                RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| AccountError::KeyGeneration {
                    key_type: *config,
                    message: e.to_string(),
                })?;
            AccountSigner::Rsa(key)
        }
        KeyFamily::Ec => match EcCurve::from_key_size(config.size) {
            EcCurve::P224 => AccountSigner::P224(p224::SecretKey::random(&mut OsRng)),
            EcCurve::P256 => AccountSigner::P256(p256::SecretKey::random(&mut OsRng)),
            EcCurve::P384 => AccountSigner::P384(p384::SecretKey::random(&mut OsRng)),
            EcCurve::P521 => AccountSigner::P521(p521::SecretKey::random(&mut OsRng)),
        },
    };

    let pem = signer.to_pem()?;

    debug!(
        requested = %config,
        generated = %signer.key_type(),
        "Generated ACME account key"
    );

    Ok(GeneratedKey { pem, signer })
}

/// Account private key usable for signing ACME requests
#[derive(Clone)]
pub enum AccountSigner {
    Rsa(RsaPrivateKey),
    P224(p224::SecretKey),
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

impl AccountSigner {
    /// Decode a PEM-encoded account key
    ///
    /// The PEM tag selects the format. EC curves are identified by the named
    /// curve in the SEC1 structure, or by the scalar length when the key
    /// carries no parameters.
    pub fn from_pem(data: &[u8]) -> Result<Self, AccountError> {
        let block = pem::parse(data)
            .map_err(|e| AccountError::Encoding(format!("malformed PEM data: {}", e)))?;

        match block.tag() {
            RSA_PEM_TAG => RsaPrivateKey::from_pkcs1_der(block.contents())
                .map(AccountSigner::Rsa)
                .map_err(|e| AccountError::Encoding(format!("invalid PKCS#1 RSA key: {}", e))),
            EC_PEM_TAG => Self::from_sec1_der(block.contents()),
            other => Err(AccountError::Encoding(format!(
                "unsupported PEM block type '{}'",
                other
            ))),
        }
    }

    fn from_sec1_der(der: &[u8]) -> Result<Self, AccountError> {
        let parsed = sec1::EcPrivateKey::try_from(der)
            .map_err(|e| AccountError::Encoding(format!("invalid SEC1 EC key: {}", e)))?;

        let curve = match parsed.parameters.and_then(|p| p.named_curve()) {
            Some(oid) => match oid.to_string().as_str() {
                OID_P224 => EcCurve::P224,
                OID_P256 => EcCurve::P256,
                OID_P384 => EcCurve::P384,
                OID_P521 => EcCurve::P521,
                other => {
                    return Err(AccountError::Encoding(format!(
                        "unsupported EC curve {}",
                        other
                    )))
                }
            },
            None => match parsed.private_key.len() {
                28 => EcCurve::P224,
                32 => EcCurve::P256,
                48 => EcCurve::P384,
                66 => EcCurve::P521,
                len => {
                    return Err(AccountError::Encoding(format!(
                        "cannot infer EC curve from {}-byte private key",
                        len
                    )))
                }
            },
        };

        let invalid = |message: String| {
            AccountError::Encoding(format!("invalid {} private key: {}", curve, message))
        };

        let signer = match curve {
            EcCurve::P224 => AccountSigner::P224(
                p224::SecretKey::from_sec1_der(der).map_err(|e| invalid(e.to_string()))?,
            ),
            EcCurve::P256 => AccountSigner::P256(
                p256::SecretKey::from_sec1_der(der).map_err(|e| invalid(e.to_string()))?,
            ),
            EcCurve::P384 => AccountSigner::P384(
                p384::SecretKey::from_sec1_der(der).map_err(|e| invalid(e.to_string()))?,
            ),
            EcCurve::P521 => AccountSigner::P521(
                p521::SecretKey::from_sec1_der(der).map_err(|e| invalid(e.to_string()))?,
            ),
        };

        Ok(signer)
    }

    /// Encode the key as PEM (PKCS#1 for RSA, SEC1 for EC)
    pub fn to_pem(&self) -> Result<String, AccountError> {
        let encoding_error =
            |e: String| AccountError::Encoding(format!("cannot encode key: {}", e));

        let block = match self {
            AccountSigner::Rsa(key) => {
                let der = key.to_pkcs1_der().map_err(|e| encoding_error(e.to_string()))?;
                Pem::new(RSA_PEM_TAG, der.as_bytes().to_vec())
            }
            AccountSigner::P224(key) => {
                let der = key.to_sec1_der().map_err(|e| encoding_error(e.to_string()))?;
                Pem::new(EC_PEM_TAG, der.to_vec())
            }
            AccountSigner::P256(key) => {
                let der = key.to_sec1_der().map_err(|e| encoding_error(e.to_string()))?;
                Pem::new(EC_PEM_TAG, der.to_vec())
            }
            AccountSigner::P384(key) => {
                let der = key.to_sec1_der().map_err(|e| encoding_error(e.to_string()))?;
                Pem::new(EC_PEM_TAG, der.to_vec())
            }
            AccountSigner::P521(key) => {
                let der = key.to_sec1_der().map_err(|e| encoding_error(e.to_string()))?;
                Pem::new(EC_PEM_TAG, der.to_vec())
            }
        };

        Ok(pem::encode_config(
            &block,
            EncodeConfig::new().set_line_ending(LineEnding::LF),
        ))
    }

    /// Key family and size of this key
    pub fn key_type(&self) -> KeyTypeConfig {
        match self {
            AccountSigner::Rsa(key) => KeyTypeConfig::rsa(key.n().bits() as u32),
            AccountSigner::P224(_) => KeyTypeConfig::ec(EcCurve::P224.bits()),
            AccountSigner::P256(_) => KeyTypeConfig::ec(EcCurve::P256.bits()),
            AccountSigner::P384(_) => KeyTypeConfig::ec(EcCurve::P384.bits()),
            AccountSigner::P521(_) => KeyTypeConfig::ec(EcCurve::P521.bits()),
        }
    }

    /// JWS `alg` value for this key, `None` for P-224
    pub fn jws_algorithm(&self) -> Option<&'static str> {
        match self {
            AccountSigner::Rsa(_) => Some("RS256"),
            AccountSigner::P224(_) => None,
            AccountSigner::P256(_) => Some("ES256"),
            AccountSigner::P384(_) => Some("ES384"),
            AccountSigner::P521(_) => Some("ES512"),
        }
    }

    /// Sign a JWS signing input
    ///
    /// RSA keys produce RSASSA-PKCS1-v1_5 SHA-256 signatures; EC keys produce
    /// the fixed-width `r || s` form JWS expects.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, AccountError> {
        let signing_error = |e: rsa::signature::Error| AccountError::Signing(e.to_string());

        match self {
            AccountSigner::Rsa(key) => {
                let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
                let signature = signing_key.try_sign(message).map_err(signing_error)?;
                Ok(signature.to_vec())
            }
            AccountSigner::P224(_) => Err(AccountError::Signing(
                "P-224 keys have no JWS algorithm".to_string(),
            )),
            AccountSigner::P256(key) => {
                let signing_key = p256::ecdsa::SigningKey::from(key);
                let signature: p256::ecdsa::Signature =
                    signing_key.try_sign(message).map_err(signing_error)?;
                Ok(signature.to_bytes().to_vec())
            }
            AccountSigner::P384(key) => {
                let signing_key = p384::ecdsa::SigningKey::from(key);
                let signature: p384::ecdsa::Signature =
                    signing_key.try_sign(message).map_err(signing_error)?;
                Ok(signature.to_bytes().to_vec())
            }
            AccountSigner::P521(key) => {
                let signing_key =
                    p521::ecdsa::SigningKey::from_bytes(&key.to_bytes()).map_err(signing_error)?;
                let signature: p521::ecdsa::Signature =
                    signing_key.try_sign(message).map_err(signing_error)?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}

impl fmt::Debug for AccountSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSigner")
            .field("key_type", &self.key_type())
            .finish_non_exhaustive()
    }
}
