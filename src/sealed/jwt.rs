use std::sync::RwLock;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::sealed::error::SealedError;

/// Provider tokens are reissued well before the provider's one-hour limit.
pub const PROVIDER_TOKEN_LIFETIME: Duration = Duration::minutes(50);

/// Identity used to sign provider authentication tokens.
pub struct ApnsCredentials {
    bundle_id: String,
    team_id: String,
    key_id: String,
    signing_key: EncodingKey,
}

impl ApnsCredentials {
    pub fn new(
        bundle_id: impl Into<String>,
        team_id: impl Into<String>,
        key_id: impl Into<String>,
        private_key_pem: &[u8],
    ) -> Result<Self, SealedError> {
        let signing_key = EncodingKey::from_ec_pem(private_key_pem)
            .map_err(|err| SealedError::Credentials(format!("signing key: {err}")))?;
        let credentials = Self {
            bundle_id: bundle_id.into(),
            team_id: team_id.into(),
            key_id: key_id.into(),
            signing_key,
        };
        if credentials.bundle_id.is_empty()
            || credentials.team_id.is_empty()
            || credentials.key_id.is_empty()
        {
            return Err(SealedError::Credentials(
                "bundle id, team id and key id are required".to_string(),
            ));
        }
        Ok(credentials)
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }
}

#[derive(Serialize)]
struct ProviderClaims<'a> {
    iss: &'a str,
    iat: i64,
}

struct CachedToken {
    bearer: String,
    issued_at: OffsetDateTime,
}

impl CachedToken {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        now >= self.issued_at && now - self.issued_at < PROVIDER_TOKEN_LIFETIME
    }
}

/// ES256 provider token, regenerated at most once per lifetime window.
///
/// This cache reads the wall clock directly; nothing else in the crate does.
pub struct ProviderTokenCache {
    credentials: ApnsCredentials,
    cached: RwLock<Option<CachedToken>>,
}

impl ProviderTokenCache {
    pub fn new(credentials: ApnsCredentials) -> Self {
        Self {
            credentials,
            cached: RwLock::new(None),
        }
    }

    pub fn credentials(&self) -> &ApnsCredentials {
        &self.credentials
    }

    pub fn bearer(&self) -> Result<String, SealedError> {
        self.bearer_at(OffsetDateTime::now_utc())
    }

    pub(super) fn bearer_at(&self, now: OffsetDateTime) -> Result<String, SealedError> {
        {
            let cached = self.cached.read().map_err(|_| SealedError::LockPoisoned)?;
            if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(now)) {
                return Ok(token.bearer.clone());
            }
        }

        let mut cached = self.cached.write().map_err(|_| SealedError::LockPoisoned)?;
        // Another caller may have refreshed while we waited for the write lock.
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(now)) {
            return Ok(token.bearer.clone());
        }

        let bearer = self.sign(now)?;
        *cached = Some(CachedToken {
            bearer: bearer.clone(),
            issued_at: now,
        });
        tracing::debug!(target: "sealed", "provider_token_refreshed");
        Ok(bearer)
    }

    fn sign(&self, now: OffsetDateTime) -> Result<String, SealedError> {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.credentials.key_id.clone());
        let claims = ProviderClaims {
            iss: &self.credentials.team_id,
            iat: now.unix_timestamp(),
        };
        encode(&header, &claims, &self.credentials.signing_key)
            .map_err(|err| SealedError::Credentials(format!("token signing: {err}")))
    }
}
