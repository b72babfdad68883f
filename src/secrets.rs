//! Secrets come from the process environment, once, at startup. They are never
//! part of the config file.

use std::env;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::sealed::{ApnsCredentials, SealedError, SealingKey};

pub const SEALED_KEY_VAR: &str = "HUSH_SEALED_KEY";
pub const APNS_BUNDLE_ID_VAR: &str = "HUSH_APNS_BUNDLE_ID";
pub const APNS_TEAM_ID_VAR: &str = "HUSH_APNS_TEAM_ID";
pub const APNS_KEY_ID_VAR: &str = "HUSH_APNS_KEY_ID";
pub const APNS_PRIVATE_KEY_VAR: &str = "HUSH_APNS_PRIVATE_KEY";

const APNS_VARS: [&str; 4] = [
    APNS_BUNDLE_ID_VAR,
    APNS_TEAM_ID_VAR,
    APNS_KEY_ID_VAR,
    APNS_PRIVATE_KEY_VAR,
];

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("{var} is not set")]
    Missing { var: &'static str },
    #[error("{var} is invalid: {source}")]
    Invalid {
        var: &'static str,
        #[source]
        source: SealedError,
    },
    #[error("APNs credentials are partially configured; missing {missing}")]
    PartialApns { missing: String },
}

pub struct SecretsEnv {
    sealing_key: Option<SealingKey>,
    apns: Option<ApnsCredentials>,
}

impl SecretsEnv {
    pub fn load() -> Result<Self, SecretsError> {
        Self::load_from(|var| env::var(var).ok())
    }

    /// Reads through `lookup` so tests never touch the process environment.
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SecretsError> {
        let sealing_key = match lookup(SEALED_KEY_VAR).map(Zeroizing::new) {
            Some(encoded) => Some(SealingKey::from_base64(&encoded).map_err(|source| {
                SecretsError::Invalid {
                    var: SEALED_KEY_VAR,
                    source,
                }
            })?),
            None => None,
        };

        let values: Vec<Option<Zeroizing<String>>> = APNS_VARS
            .iter()
            .map(|var| lookup(*var).filter(|value| !value.trim().is_empty()).map(Zeroizing::new))
            .collect();
        let apns = match values.as_slice() {
            [Some(bundle_id), Some(team_id), Some(key_id), Some(private_key)] => Some(
                ApnsCredentials::new(
                    bundle_id.as_str(),
                    team_id.as_str(),
                    key_id.as_str(),
                    private_key.as_bytes(),
                )
                .map_err(|source| SecretsError::Invalid {
                    var: APNS_PRIVATE_KEY_VAR,
                    source,
                })?,
            ),
            _ if values.iter().all(Option::is_none) => None,
            _ => {
                let missing = APNS_VARS
                    .iter()
                    .zip(&values)
                    .filter(|(_, value)| value.is_none())
                    .map(|(var, _)| *var)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(SecretsError::PartialApns { missing });
            }
        };

        Ok(Self { sealing_key, apns })
    }

    pub fn take_sealing_key(&mut self) -> Result<SealingKey, SecretsError> {
        self.sealing_key.take().ok_or(SecretsError::Missing {
            var: SEALED_KEY_VAR,
        })
    }

    pub fn take_apns(&mut self) -> Result<ApnsCredentials, SecretsError> {
        self.apns.take().ok_or(SecretsError::Missing {
            var: APNS_PRIVATE_KEY_VAR,
        })
    }
}
