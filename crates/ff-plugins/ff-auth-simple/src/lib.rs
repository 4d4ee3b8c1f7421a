//! # ff-auth-simple
//!
//! Argon2-based implementation of `PasswordVault` and an HS256 JWT
//! implementation of `TokenCodec`.
//! Also hosts the avatar hash derived from an account's email.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use chrono::Duration;
use ff_core::auth::{from_millis, TokenClaims, TokenPurpose};
use ff_core::error::{AppError, Result};
use ff_core::traits::{PasswordVault, TokenCodec};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Argon2id password hashing with a fresh random salt per digest.
pub struct Argon2Vault {
    argon2: Argon2<'static>,
}

impl Default for Argon2Vault {
    fn default() -> Self {
        Self { argon2: Argon2::default() }
    }
}

impl Argon2Vault {
    /// Custom cost parameters (memory in KiB, iterations, lanes).
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None).map_err(AppError::internal)?;
        Ok(Self { argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) })
    }
}

impl PasswordVault for Argon2Vault {
    fn hash(&self, plaintext: &SecretString) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.expose_secret().as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(AppError::internal)
    }

    /// Verifies if a provided password matches a stored Argon2 hash.
    fn verify(&self, plaintext: &SecretString, digest: &str) -> bool {
        let parsed_hash = match PasswordHash::new(digest) {
            Ok(p) => p,
            Err(_) => return false,
        };
        self.argon2
            .verify_password(plaintext.expose_secret().as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Wire form of [`TokenClaims`].
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    sub: String,
    typ: TokenPurpose,
    iat: i64,
    exp: i64,
    /// Issue time in millis, matched against the stored per-user value.
    iat_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_email: Option<String>,
}

/// Signs claims as HS256 JWTs over a shared secret.
pub struct JwtTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenCodec {
    pub fn new(secret: &SecretString) -> Self {
        let secret = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    fn reject(purpose: TokenPurpose, reason: &str) -> AppError {
        tracing::debug!(purpose = purpose.as_str(), reason, "rejected token");
        AppError::invalid_token()
    }
}

impl TokenCodec for JwtTokenCodec {
    fn issue(&self, claims: &TokenClaims, ttl: Duration) -> Result<String> {
        let expires_at = claims.issued_at + ttl;
        let wire = JwtClaims {
            sub: claims.subject.to_string(),
            typ: claims.purpose,
            iat: claims.issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iat_ms: claims.issued_at_millis(),
            new_email: claims.new_email.clone(),
        };
        encode(&Header::default(), &wire, &self.encoding_key).map_err(AppError::internal)
    }

    fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<TokenClaims> {
        let wire = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| Self::reject(purpose, &e.to_string()))?
            .claims;
        if wire.typ != purpose {
            return Err(Self::reject(purpose, "purpose mismatch"));
        }
        let subject = wire.sub.parse::<i64>().map_err(|_| Self::reject(purpose, "malformed subject"))?;
        Ok(TokenClaims {
            subject,
            purpose: wire.typ,
            issued_at: from_millis(wire.iat_ms),
            new_email: wire.new_email,
        })
    }
}

/// Avatar service hash: SHA-256 hex of the trimmed, lower-cased email.
pub fn avatar_hash(email: &str) -> String {
    hex::encode(Sha256::digest(email.trim().to_lowercase().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ff_core::error::INVALID_TOKEN;

    fn codec(secret: &str) -> JwtTokenCodec {
        JwtTokenCodec::new(&SecretString::from(secret.to_string()))
    }

    fn vault() -> Argon2Vault {
        Argon2Vault::with_params(1024, 1, 1).unwrap()
    }

    #[test]
    fn password_round_trip() {
        let vault = vault();
        let secret = SecretString::from("cat".to_string());
        let digest = vault.hash(&secret).unwrap();
        assert!(!digest.contains("cat"));
        assert!(vault.verify(&secret, &digest));
        assert!(!vault.verify(&SecretString::from("dog".to_string()), &digest));
    }

    #[test]
    fn hashes_are_salted() {
        let vault = vault();
        let secret = SecretString::from("cat".to_string());
        assert_ne!(vault.hash(&secret).unwrap(), vault.hash(&secret).unwrap());
    }

    #[test]
    fn malformed_digest_never_verifies() {
        assert!(!vault().verify(&SecretString::from("cat".to_string()), "not-a-phc-string"));
    }

    #[test]
    fn issue_then_verify() {
        let codec = codec("secret");
        let claims = TokenClaims::new(42, TokenPurpose::Access);
        let token = codec.issue(&claims, Duration::hours(1)).unwrap();
        let verified = codec.verify(&token, TokenPurpose::Access).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn purposes_are_not_interchangeable() {
        let codec = codec("secret");
        let refresh = codec
            .issue(&TokenClaims::new(1, TokenPurpose::Refresh), Duration::days(31))
            .unwrap();
        let access = codec
            .issue(&TokenClaims::new(1, TokenPurpose::Access), Duration::hours(1))
            .unwrap();
        assert_eq!(codec.verify(&refresh, TokenPurpose::Access), Err(AppError::invalid_token()));
        assert_eq!(codec.verify(&access, TokenPurpose::Refresh), Err(AppError::invalid_token()));
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec("secret");
        let claims = TokenClaims::at(1, TokenPurpose::Access, Utc::now() - Duration::hours(2));
        let token = codec.issue(&claims, Duration::hours(1)).unwrap();
        assert_eq!(codec.verify(&token, TokenPurpose::Access), Err(AppError::invalid_token()));
    }

    #[test]
    fn foreign_or_tampered_tokens_look_the_same() {
        let token = codec("a").issue(&TokenClaims::new(1, TokenPurpose::Access), Duration::hours(1)).unwrap();
        let wrong_key = codec("b").verify(&token, TokenPurpose::Access).unwrap_err();
        let garbage = codec("a").verify("not.a.token", TokenPurpose::Access).unwrap_err();
        assert_eq!(wrong_key, garbage);
        assert_eq!(wrong_key.to_string(), format!("unauthorized: {INVALID_TOKEN}"));
    }

    #[test]
    fn change_email_token_carries_address() {
        let codec = codec("secret");
        let claims = TokenClaims::new(5, TokenPurpose::ChangeEmail).with_new_email("new@example.com");
        let token = codec.issue(&claims, Duration::hours(1)).unwrap();
        let verified = codec.verify(&token, TokenPurpose::ChangeEmail).unwrap();
        assert_eq!(verified.new_email.as_deref(), Some("new@example.com"));
    }

    #[test]
    fn avatar_hash_ignores_case() {
        assert_eq!(avatar_hash("Ann@Example.com "), avatar_hash("ann@example.com"));
        assert_eq!(avatar_hash("ann@example.com").len(), 64);
    }
}
