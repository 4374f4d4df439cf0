use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sha2::{Digest, Sha256};
use sqlx::Row;
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::user::{User, USER_COLUMNS};
use crate::infra::db::Db;

const TOKEN_ISSUER: &str = "agora";

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn claim(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordChange {
    Changed,
    IncorrectPassword,
    UserNotFound,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_key: Option<String>,
    pub date_of_birth: Option<Date>,
}

/// Encrypts and decrypts PASETO v4.local tokens. Holds no database state so
/// request extractors can verify access tokens without a round trip.
#[derive(Clone)]
pub struct TokenCodec {
    access_key: [u8; 32],
    refresh_key: [u8; 32],
    access_ttl_minutes: u64,
    refresh_ttl_days: u64,
}

impl TokenCodec {
    pub fn new(
        access_key: [u8; 32],
        refresh_key: [u8; 32],
        access_ttl_minutes: u64,
        refresh_ttl_days: u64,
    ) -> Self {
        Self {
            access_key,
            refresh_key,
            access_ttl_minutes,
            refresh_ttl_days,
        }
    }

    pub fn issue_access(&self, user_id: Uuid) -> Result<(String, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", TokenKind::Access.claim())?;

        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::minutes(self.access_ttl_minutes as i64);
        Ok((token, expires_at))
    }

    pub fn issue_refresh(&self, user_id: Uuid, refresh_id: Uuid) -> Result<(String, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.refresh_ttl_days * 24 * 60 * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.token_identifier(&refresh_id.to_string())?;
        claims.add_additional("typ", TokenKind::Refresh.claim())?;

        let key = SymmetricKey::<V4>::from(&self.refresh_key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        let expires_at = OffsetDateTime::now_utc() + Duration::days(self.refresh_ttl_days as i64);
        Ok((token, expires_at))
    }

    /// Subject of a valid, unexpired access token.
    pub fn verify_access(&self, token: &str) -> Option<Uuid> {
        let claims = self.decrypt(token, TokenKind::Access)?;
        claim_uuid(&claims, "sub").ok()
    }

    /// `(user_id, refresh_id)` of a valid, unexpired refresh token.
    pub fn verify_refresh(&self, token: &str) -> Option<(Uuid, Uuid)> {
        let claims = self.decrypt(token, TokenKind::Refresh)?;
        let user_id = claim_uuid(&claims, "sub").ok()?;
        let refresh_id = claim_uuid(&claims, "jti").ok()?;
        Some((user_id, refresh_id))
    }

    fn decrypt(&self, token: &str, kind: TokenKind) -> Option<Claims> {
        let key_bytes = match kind {
            TokenKind::Access => self.access_key,
            TokenKind::Refresh => self.refresh_key,
        };
        let key = SymmetricKey::<V4>::from(&key_bytes).ok()?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = UntrustedToken::<Local, V4>::try_from(token).ok()?;
        let trusted = local::decrypt(&key, &untrusted, &rules, None, None).ok()?;
        let claims = trusted.payload_claims()?.clone();
        if has_token_type(&claims, kind.claim()) {
            Some(claims)
        } else {
            None
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    codec: TokenCodec,
}

impl AuthService {
    pub fn new(db: Db, codec: TokenCodec) -> Self {
        Self { db, codec }
    }

    pub async fn signup(&self, account: NewAccount) -> Result<User> {
        let password_hash = hash_password(&account.password)?;
        let row = sqlx::query(&format!(
            "INSERT INTO users \
                (username, email, first_name, last_name, bio, avatar_key, date_of_birth, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(account.username)
        .bind(account.email)
        .bind(account.first_name)
        .bind(account.last_name)
        .bind(account.bio)
        .bind(account.avatar_key)
        .bind(account.date_of_birth)
        .bind(password_hash)
        .fetch_one(self.db.pool())
        .await?;

        Ok(User::from_row(&row))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Option<TokenPair>> {
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE lower(email) = lower($1)")
            .bind(email.trim())
            .fetch_optional(self.db.pool())
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let user_id: Uuid = row.get("id");
        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() || !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let tokens = self.issue_token_pair(user_id).await?;
        tracing::info!(user_id = %user_id, "user logged in");
        Ok(Some(tokens))
    }

    /// Rotate a refresh token: the presented token is revoked and replaced.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Option<TokenPair>> {
        let Some((user_id, refresh_id)) = self.codec.verify_refresh(refresh_token) else {
            return Ok(None);
        };
        let token_hash = hash_token(refresh_token);

        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(
            "SELECT id \
             FROM refresh_tokens \
             WHERE id = $1 \
               AND user_id = $2 \
               AND token_hash = $3 \
               AND revoked_at IS NULL \
               AND expires_at > now() \
             FOR UPDATE",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        if row.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let tokens = self.issue_token_pair_with_tx(user_id, &mut tx).await?;
        sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now(), replaced_by = $1 \
             WHERE id = $2 AND revoked_at IS NULL",
        )
        .bind(tokens.refresh_id)
        .bind(refresh_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(tokens.pair))
    }

    /// Revoke one refresh token owned by `user_id`. Returns false when the
    /// token is invalid, already revoked, or belongs to someone else.
    pub async fn revoke_refresh_token(&self, user_id: Uuid, refresh_token: &str) -> Result<bool> {
        let Some((token_user_id, refresh_id)) = self.codec.verify_refresh(refresh_token) else {
            return Ok(false);
        };
        if token_user_id != user_id {
            return Ok(false);
        }

        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 AND revoked_at IS NULL",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke every outstanding refresh token of a user.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Which kind of token `token` is, if it is currently valid. Refresh
    /// tokens must also still be live in the token store.
    pub async fn verify_token(&self, token: &str) -> Result<Option<TokenKind>> {
        if self.codec.verify_access(token).is_some() {
            return Ok(Some(TokenKind::Access));
        }

        let Some((user_id, refresh_id)) = self.codec.verify_refresh(token) else {
            return Ok(None);
        };
        let live: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM refresh_tokens \
                WHERE id = $1 AND user_id = $2 AND token_hash = $3 \
                  AND revoked_at IS NULL AND expires_at > now() \
             )",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(hash_token(token))
        .fetch_one(self.db.pool())
        .await?;

        Ok(live.then_some(TokenKind::Refresh))
    }

    pub fn authenticate_access_token(&self, token: &str) -> Option<AuthSession> {
        self.codec
            .verify_access(token)
            .map(|user_id| AuthSession { user_id })
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<PasswordChange> {
        let current: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(self.db.pool())
                .await?;

        let Some(current) = current else {
            return Ok(PasswordChange::UserNotFound);
        };
        if !verify_password(old_password, &current)? {
            return Ok(PasswordChange::IncorrectPassword);
        }

        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(hash_password(new_password)?)
            .execute(self.db.pool())
            .await?;

        tracing::info!(user_id = %user_id, "password changed");
        Ok(PasswordChange::Changed)
    }

    pub async fn get_current_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(User::from_row))
    }

    pub async fn issue_token_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        let mut tx = self.db.pool().begin().await?;
        let tokens = self.issue_token_pair_with_tx(user_id, &mut tx).await?;
        tx.commit().await?;
        Ok(tokens.pair)
    }

    async fn issue_token_pair_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<IssuedTokens> {
        let (access_token, access_expires_at) = self.codec.issue_access(user_id)?;

        let refresh_id = Uuid::new_v4();
        let (refresh_token, refresh_expires_at) = self.codec.issue_refresh(user_id, refresh_id)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(hash_token(&refresh_token))
        .bind(refresh_expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(IssuedTokens {
            refresh_id,
            pair: TokenPair {
                access_token,
                refresh_token,
                access_expires_at,
                refresh_expires_at,
            },
        })
    }
}

struct IssuedTokens {
    refresh_id: Uuid,
    pair: TokenPair,
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

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
