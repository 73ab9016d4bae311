//! JWT verification using RS256-family algorithms.
//!
//! Two token kinds flow through the system:
//! - Device tokens: self-signed by a device with the private half of the
//!   key pair it registered at enrollment. Verified per request against the
//!   public key stored on the device row.
//! - Office tokens: issued by the external identity provider and verified
//!   against its configured public key.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Issuer expected on device-signed tokens.
pub const DEVICE_TOKEN_ISSUER: &str = "carecall-device";

/// Audience expected on device-signed tokens.
pub const DEVICE_TOKEN_AUDIENCE: &str = "carecall";

/// Clock skew tolerance for token validation.
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Claims carried by a device-signed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceClaims {
    /// Subject, must equal the device id the token is presented for.
    pub sub: String,
    /// Expiration time (Unix timestamp), required.
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    pub iss: String,
    pub aud: String,
}

/// Claims carried by an office bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficeClaims {
    /// Subject identifying the office operator.
    pub sub: String,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Verifies a device-signed bearer token against the device's registered
/// public key.
///
/// Enforces issuer, audience, subject (= expected device id), a required
/// expiry and 30s clock-skew leeway. RS256/384/512 are accepted, matching
/// what device key pairs are generated with.
pub fn verify_device_token(
    token: &str,
    public_key_pem: &str,
    expected_device_id: &str,
) -> Result<DeviceClaims, JwtError> {
    let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map_err(|e| JwtError::InvalidKey(e.to_string()))?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.algorithms = vec![Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];
    validation.set_issuer(&[DEVICE_TOKEN_ISSUER]);
    validation.set_audience(&[DEVICE_TOKEN_AUDIENCE]);
    validation.sub = Some(expected_device_id.to_string());
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    validation.leeway = DEFAULT_LEEWAY_SECS;

    let data = decode::<DeviceClaims>(token, &decoding_key, &validation)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;
    Ok(data.claims)
}

/// Checks that a submitted public key is a usable RSA key in PEM format.
/// Run at enrollment so a device cannot bind a key it can never
/// authenticate with.
pub fn validate_rsa_public_key(public_key_pem: &str) -> Result<(), JwtError> {
    DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map(|_| ())
        .map_err(|e| JwtError::InvalidKey(e.to_string()))
}

/// Signs a device token with the device's private key.
///
/// The server never signs device tokens; this exists for the device client
/// and for tests exercising [`verify_device_token`].
pub fn sign_device_token(
    private_key_pem: &str,
    device_id: &str,
    ttl_secs: i64,
) -> Result<String, JwtError> {
    let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| JwtError::InvalidKey(e.to_string()))?;

    let now = Utc::now().timestamp();
    let claims = DeviceClaims {
        sub: device_id.to_string(),
        exp: now + ttl_secs,
        iat: now,
        iss: DEVICE_TOKEN_ISSUER.to_string(),
        aud: DEVICE_TOKEN_AUDIENCE.to_string(),
    };

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| JwtError::EncodingError(e.to_string()))
}

/// Verifier for office bearer tokens issued by the external identity
/// provider.
#[derive(Clone)]
pub struct OfficeTokenVerifier {
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
}

impl std::fmt::Debug for OfficeTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfficeTokenVerifier")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl OfficeTokenVerifier {
    /// Creates a verifier from the identity provider's RSA public key in
    /// PEM format.
    pub fn new(public_key_pem: &str, issuer: &str, audience: &str) -> Result<Self, JwtError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(e.to_string()))?;
        Ok(Self {
            decoding_key,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        })
    }

    /// Verifies an office bearer token and returns its claims.
    pub fn verify(&self, token: &str) -> Result<OfficeClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = DEFAULT_LEEWAY_SECS;

        let data = decode::<OfficeClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| JwtError::InvalidToken(e.to_string()))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test RSA key pair, used only in tests.
    const TEST_PRIVATE_KEY: &str = include_str!("testdata/test_key.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("testdata/test_key.pub.pem");

    #[test]
    fn test_device_token_round_trip() {
        let token = sign_device_token(TEST_PRIVATE_KEY, "device-123", 300).unwrap();
        let claims = verify_device_token(&token, TEST_PUBLIC_KEY, "device-123").unwrap();
        assert_eq!(claims.sub, "device-123");
        assert_eq!(claims.iss, DEVICE_TOKEN_ISSUER);
        assert_eq!(claims.aud, DEVICE_TOKEN_AUDIENCE);
    }

    #[test]
    fn test_device_token_wrong_subject_rejected() {
        let token = sign_device_token(TEST_PRIVATE_KEY, "device-123", 300).unwrap();
        let result = verify_device_token(&token, TEST_PUBLIC_KEY, "device-456");
        assert!(matches!(result, Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn test_device_token_expired_rejected() {
        // Expired well beyond the 30s leeway.
        let token = sign_device_token(TEST_PRIVATE_KEY, "device-123", -120).unwrap();
        let result = verify_device_token(&token, TEST_PUBLIC_KEY, "device-123");
        assert!(matches!(result, Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn test_device_token_within_leeway_accepted() {
        // Expired 10s ago, inside the 30s clock-skew tolerance.
        let token = sign_device_token(TEST_PRIVATE_KEY, "device-123", -10).unwrap();
        assert!(verify_device_token(&token, TEST_PUBLIC_KEY, "device-123").is_ok());
    }

    #[test]
    fn test_device_token_garbage_rejected() {
        let result = verify_device_token("not-a-token", TEST_PUBLIC_KEY, "device-123");
        assert!(matches!(result, Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn test_device_token_bad_key_rejected() {
        let token = sign_device_token(TEST_PRIVATE_KEY, "device-123", 300).unwrap();
        let result = verify_device_token(&token, "not a pem key", "device-123");
        assert!(matches!(result, Err(JwtError::InvalidKey(_))));
    }

    #[test]
    fn test_validate_rsa_public_key() {
        assert!(validate_rsa_public_key(TEST_PUBLIC_KEY).is_ok());
        assert!(validate_rsa_public_key("-----BEGIN NONSENSE-----").is_err());
    }

    #[test]
    fn test_office_verifier_checks_issuer_and_audience() {
        // Sign a token with the device helper; its issuer/audience do not
        // match what the office verifier expects.
        let token = sign_device_token(TEST_PRIVATE_KEY, "operator-1", 300).unwrap();

        let verifier =
            OfficeTokenVerifier::new(TEST_PUBLIC_KEY, "https://idp.example.com/", "carecall-api")
                .unwrap();
        assert!(verifier.verify(&token).is_err());

        let matching =
            OfficeTokenVerifier::new(TEST_PUBLIC_KEY, DEVICE_TOKEN_ISSUER, DEVICE_TOKEN_AUDIENCE)
                .unwrap();
        let claims = matching.verify(&token).unwrap();
        assert_eq!(claims.sub, "operator-1");
    }
}
