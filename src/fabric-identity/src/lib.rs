use p256::{
    ecdsa::{signature::Signer, Signature, SigningKey},
    pkcs8::DecodePrivateKey,
    SecretKey,
};
use std::fmt;
use thiserror::Error;

mod import;
mod wallet;

pub use import::{import_identity, ImportError, ImportRequest};
pub use wallet::{FileSystemWallet, InMemoryWallet, Wallet, WalletError};

/// Identity type tag stored alongside every X.509 identity.
pub const X509_IDENTITY_TYPE: &str = "X.509";

const CERTIFICATE_PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const CERTIFICATE_PEM_END: &str = "-----END CERTIFICATE-----";
const SEC1_PEM_LABEL: &str = "EC PRIVATE KEY";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("MSP id must not be empty")]
    EmptyMspId,
    #[error("certificate is not a PEM encoded X.509 certificate")]
    InvalidCertificate,
    #[error("private key is not a PEM encoded P-256 key: {0}")]
    InvalidPrivateKey(String),
}

/// PEM encoded certificate and private key of an identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub certificate: String,
    pub private_key: String,
}

// keep private keys out of the logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("certificate", &self.certificate)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// X.509 identity issued by the membership service provider `msp_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Identity {
    pub msp_id: String,
    pub credentials: Credentials,
}

impl X509Identity {
    /// Creates a new identity, checking that both PEM documents can be used to sign proposals.
    pub fn new(
        msp_id: impl Into<String>,
        certificate: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let identity = Self {
            msp_id: msp_id.into(),
            credentials: Credentials {
                certificate: certificate.into(),
                private_key: private_key.into(),
            },
        };
        if identity.msp_id.trim().is_empty() {
            return Err(IdentityError::EmptyMspId);
        }
        validate_certificate(&identity.credentials.certificate)?;
        identity.signer()?;
        Ok(identity)
    }

    pub fn certificate_bytes(&self) -> &[u8] {
        self.credentials.certificate.as_bytes()
    }

    pub fn signer(&self) -> Result<IdentitySigner, IdentityError> {
        IdentitySigner::from_pem(&self.credentials.private_key)
    }
}

fn validate_certificate(certificate: &str) -> Result<(), IdentityError> {
    match certificate.find(CERTIFICATE_PEM_BEGIN) {
        Some(begin) if certificate[begin..].contains(CERTIFICATE_PEM_END) => Ok(()),
        _ => Err(IdentityError::InvalidCertificate),
    }
}

/// Signs proposals on behalf of an identity.
#[derive(Clone)]
pub struct IdentitySigner {
    key: SigningKey,
}

impl IdentitySigner {
    /// Accepts both PKCS#8 ("PRIVATE KEY") and SEC1 ("EC PRIVATE KEY") documents.
    pub fn from_pem(pem: &str) -> Result<Self, IdentityError> {
        let pem = pem.trim();
        let key = if pem.contains(SEC1_PEM_LABEL) {
            SecretKey::from_sec1_pem(pem)
                .map(SigningKey::from)
                .map_err(|e| IdentityError::InvalidPrivateKey(e.to_string()))?
        } else {
            SigningKey::from_pkcs8_pem(pem)
                .map_err(|e| IdentityError::InvalidPrivateKey(e.to_string()))?
        };
        Ok(Self { key })
    }

    /// ECDSA P-256 over the SHA-256 digest of `message`, DER encoded.
    /// Peers only accept the low-S form of the signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.key.sign(message);
        let signature = signature.normalize_s().unwrap_or(signature);
        signature.to_der().as_bytes().to_vec()
    }

    pub fn verifying_key(&self) -> &p256::ecdsa::VerifyingKey {
        self.key.verifying_key()
    }
}

impl fmt::Debug for IdentitySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentitySigner").finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::test_data::*;
    use super::*;
    use p256::ecdsa::{signature::Verifier, Signature};

    #[test]
    fn test_create_identity() {
        let identity = X509Identity::new("Org1MSP", CERTIFICATE, PRIVATE_KEY).unwrap();
        assert_eq!(identity.msp_id, "Org1MSP");
        assert_eq!(identity.credentials.certificate, CERTIFICATE);
    }

    #[test]
    fn test_create_identity_with_wrong_key() {
        let res = X509Identity::new("Org1MSP", CERTIFICATE, WRONG_PRIVATE_KEY);
        assert!(matches!(res, Err(IdentityError::InvalidPrivateKey(_))));
    }

    #[test]
    fn test_create_identity_with_wrong_certificate() {
        let res = X509Identity::new("Org1MSP", "certificate", PRIVATE_KEY);
        assert!(matches!(res, Err(IdentityError::InvalidCertificate)));
    }

    #[test]
    fn test_create_identity_without_msp_id() {
        let res = X509Identity::new(" ", CERTIFICATE, PRIVATE_KEY);
        assert!(matches!(res, Err(IdentityError::EmptyMspId)));
    }

    #[test]
    fn test_signature_is_verifiable_and_low_s() {
        let signer = IdentitySigner::from_pem(PRIVATE_KEY).unwrap();
        let message = b"proposal bytes";

        let der = signer.sign(message);
        let signature = Signature::from_der(&der).unwrap();

        assert!(signer.verifying_key().verify(message, &signature).is_ok());
        // already normalized
        assert!(signature.normalize_s().is_none());
    }

    #[test]
    fn test_sec1_key_matches_pkcs8_key() {
        let pkcs8 = IdentitySigner::from_pem(PRIVATE_KEY).unwrap();
        let sec1 = IdentitySigner::from_pem(SEC1_PRIVATE_KEY).unwrap();
        assert_eq!(pkcs8.verifying_key(), sec1.verifying_key());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let identity = X509Identity::new("Org1MSP", CERTIFICATE, PRIVATE_KEY).unwrap();
        let debug = format!("{:?}", identity);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("PRIVATE KEY"));
    }
}
