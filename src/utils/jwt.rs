use std::{collections::HashSet, env};

use jsonwebtoken::{
    decode, encode, errors::Error, Algorithm, DecodingKey, EncodingKey, Header, TokenData,
    Validation,
};
use thiserror::Error;

use crate::session::Claims;

/// Minimum acceptable size for the JWT secret in bytes.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;
/// Minimum number of unique bytes expected for the JWT secret to avoid trivially guessable values.
const MIN_UNIQUE_JWT_BYTES: usize = 8;

#[derive(Debug, Error)]
pub enum JwtSecretError {
    #[error("JWT_SECRET must be set")]
    Missing,
    #[error("JWT_SECRET must be at least {required} bytes, but {actual} bytes were provided")]
    TooShort { actual: usize, required: usize },
    #[error(
        "JWT_SECRET must contain sufficient entropy (at least {required} unique bytes); only {actual} unique bytes found"
    )]
    LowEntropy { actual: usize, required: usize },
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn from_env() -> Result<Self, JwtSecretError> {
        let value = env::var("JWT_SECRET").map_err(|_| JwtSecretError::Missing)?;
        Self::from_secret(value)
    }

    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self, JwtSecretError> {
        let bytes = secret.as_ref();
        validate_secret(bytes)?;

        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        })
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

fn validate_secret(secret: &[u8]) -> Result<(), JwtSecretError> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(JwtSecretError::TooShort {
            actual: secret.len(),
            required: MIN_JWT_SECRET_LENGTH,
        });
    }

    let unique = secret.iter().copied().collect::<HashSet<_>>().len();
    if unique < MIN_UNIQUE_JWT_BYTES {
        return Err(JwtSecretError::LowEntropy {
            actual: unique,
            required: MIN_UNIQUE_JWT_BYTES,
        });
    }

    Ok(())
}

pub fn create_jwt(
    mut claims: Claims,
    keys: &JwtKeys,
    issuer: &str,
    audience: &str,
) -> Result<String, Error> {
    claims.iss = issuer.to_owned();
    claims.aud = audience.to_owned();
    encode(&Header::default(), &claims, keys.encoding_key())
}

pub fn decode_jwt(
    token: &str,
    keys: &JwtKeys,
    issuer: &str,
    audience: &str,
) -> Result<TokenData<Claims>, Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);
    validation.iss = Some(HashSet::from([issuer.to_owned()]));
    validation.validate_exp = true;
    validation.required_spec_claims.insert("exp".to_string());
    decode::<Claims>(token, keys.decoding_key(), &validation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn claims_expiring_in(seconds: i64) -> Claims {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        Claims {
            sub: "user_2x7abc".into(),
            email: Some("test@example.com".into()),
            exp: (now + seconds) as usize,
            iss: String::new(),
            aud: String::new(),
        }
    }

    #[test]
    fn round_trip_preserves_the_subject() {
        let keys = JwtKeys::from_secret(TEST_SECRET).unwrap();
        let token = create_jwt(claims_expiring_in(3600), &keys, "platewise", "platewise-app")
            .expect("token should encode");

        let decoded = decode_jwt(&token, &keys, "platewise", "platewise-app")
            .expect("token should decode");
        assert_eq!(decoded.claims.sub, "user_2x7abc");
        assert_eq!(decoded.claims.iss, "platewise");
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let keys = JwtKeys::from_secret(TEST_SECRET).unwrap();
        let token =
            create_jwt(claims_expiring_in(3600), &keys, "platewise", "platewise-app").unwrap();

        assert!(decode_jwt(&token, &keys, "platewise", "other-app").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = JwtKeys::from_secret(TEST_SECRET).unwrap();
        let token =
            create_jwt(claims_expiring_in(-3600), &keys, "platewise", "platewise-app").unwrap();

        assert!(decode_jwt(&token, &keys, "platewise", "platewise-app").is_err());
    }

    #[test]
    fn short_secret_is_refused() {
        assert!(matches!(
            JwtKeys::from_secret("too-short"),
            Err(JwtSecretError::TooShort { .. })
        ));
    }

    #[test]
    fn low_entropy_secret_is_refused() {
        assert!(matches!(
            JwtKeys::from_secret("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            Err(JwtSecretError::LowEntropy { .. })
        ));
    }
}
