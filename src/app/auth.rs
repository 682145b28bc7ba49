use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sqlx::Row;
use tracing::info;

use crate::domain::user::User;
use crate::infra::db::Db;

const TOKEN_ISSUER: &str = "quill";
const USERNAME_CLAIM: &str = "username";

/// Identity carried by a valid session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: i64,
    pub username: String,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    session_key: [u8; 32],
    session_ttl_hours: u64,
}

impl AuthService {
    pub fn new(db: Db, session_key: [u8; 32], session_ttl_hours: u64) -> Self {
        Self {
            db,
            session_key,
            session_ttl_hours,
        }
    }

    /// Creates an account. Returns `None` when the username is taken.
    pub async fn signup(&self, username: &str, password: &str) -> Result<Option<User>> {
        let password_hash = hash_password(password)?;
        let row = sqlx::query(
            "INSERT INTO users (username, password_hash) \
             VALUES ($1, $2) \
             ON CONFLICT (username) DO NOTHING \
             RETURNING id, username, created_at",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_optional(self.db.pool())
        .await?;

        let user = row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            created_at: row.get("created_at"),
        });
        if let Some(user) = &user {
            info!(user_id = user.id, username = %user.username, "user signed up");
        }
        Ok(user)
    }

    /// Checks credentials and issues a session token on success.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<(User, String)>> {
        let row = sqlx::query(
            "SELECT id, username, created_at, password_hash \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() {
            return Ok(None);
        }
        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let user = User {
            id: row.get("id"),
            username: row.get("username"),
            created_at: row.get("created_at"),
        };
        let token = self.issue_session(user.id, &user.username)?;
        Ok(Some((user, token)))
    }

    pub fn issue_session(&self, user_id: i64, username: &str) -> Result<String> {
        let duration = std::time::Duration::from_secs(self.session_ttl_hours * 60 * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional(USERNAME_CLAIM, username)?;

        let key = SymmetricKey::<V4>::from(&self.session_key)?;
        Ok(local::encrypt(&key, &claims, None, None)?)
    }

    /// Returns `None` for malformed, forged or expired tokens.
    pub fn authenticate_session(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        let user_id = claim_str(&claims, "sub")?
            .parse::<i64>()
            .map_err(|err| anyhow!("invalid sub claim: {}", err))?;
        let username = claim_str(&claims, USERNAME_CLAIM)?.to_string();
        Ok(Some(AuthSession { user_id, username }))
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.session_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn claim_str<'a>(claims: &'a Claims, name: &str) -> Result<&'a str> {
    claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))
}
