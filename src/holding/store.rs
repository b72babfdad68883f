use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    audit::error::{StoreError, internal_error, invalid_request},
    canonical::CanonicalString,
    clock::{Clock, bucket_15m},
    delivery::ports::PreviewSource,
    escalation::{
        trust::TrustSource,
        types::{HorizonBucket, MagnitudeBucket},
    },
    holding::{
        engine::can_create_contract,
        types::{
            Eligibility, HoldingAction, HoldingContract, HoldingDuration, HoldingScope,
            HoldingState,
        },
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingRequest {
    pub circle_id_hash: String,
    pub scope: HoldingScope,
    pub action: HoldingAction,
    pub duration: HoldingDuration,
    pub max_horizon: HorizonBucket,
    pub max_magnitude: MagnitudeBucket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(HoldingContract),
    Refused(Eligibility),
}

pub struct HoldingContractStore {
    clock: Arc<dyn Clock>,
    contracts: Mutex<BTreeMap<String, HoldingContract>>,
}

impl HoldingContractStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            contracts: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn create(
        &self,
        request: HoldingRequest,
        trust: &dyn TrustSource,
        preview: &dyn PreviewSource,
    ) -> Result<CreateOutcome, StoreError> {
        if request.circle_id_hash.is_empty() {
            return Err(invalid_request("holding contract circle cannot be empty"));
        }

        let now = self.clock.now();
        let mut contracts = self.lock()?;
        let has_active_contract = contracts
            .get(&request.circle_id_hash)
            .is_some_and(|contract| contract.is_active_at(now));

        let eligibility = can_create_contract(
            trust.has_baseline(&request.circle_id_hash),
            preview.preview_active(&request.circle_id_hash),
            has_active_contract,
        );
        if !eligibility.allowed {
            tracing::debug!(
                target: "holding",
                reason = eligibility.reason.map(|reason| reason.as_str()),
                "holding_contract_refused"
            );
            return Ok(CreateOutcome::Refused(eligibility));
        }

        let created_at = bucket_15m(now);
        let contract_id_hash = CanonicalString::new("HOLDING_CONTRACT")
            .and_then(|builder| {
                builder.push_all([
                    request.circle_id_hash.as_str(),
                    request.scope.as_str(),
                    request.action.as_str(),
                    request.duration.as_str(),
                    request.max_horizon.as_str(),
                    request.max_magnitude.as_str(),
                    &created_at.unix_timestamp().to_string(),
                ])
            })
            .map_err(|err| invalid_request(err.to_string()))?
            .short_hash();

        let contract = HoldingContract {
            contract_id_hash,
            circle_id_hash: request.circle_id_hash,
            scope: request.scope,
            action: request.action,
            duration: request.duration,
            max_horizon: request.max_horizon,
            max_magnitude: request.max_magnitude,
            state: HoldingState::Active,
            created_at,
            expires_at: now + request.duration.as_duration(),
        };
        contracts.insert(contract.circle_id_hash.clone(), contract.clone());

        tracing::debug!(
            target: "holding",
            contract_id_hash = %contract.contract_id_hash,
            action = contract.action.as_str(),
            "holding_contract_created"
        );
        Ok(CreateOutcome::Created(contract))
    }

    /// Removes the circle's contract. Revoking when nothing is active is a
    /// no-op that returns `None`.
    pub fn revoke(&self, circle_id_hash: &str) -> Result<Option<HoldingContract>, StoreError> {
        Ok(self.lock()?.remove(circle_id_hash).map(|mut contract| {
            contract.state = HoldingState::Revoked;
            contract
        }))
    }

    pub fn active_for(&self, circle_id_hash: &str, now: OffsetDateTime) -> Option<HoldingContract> {
        self.lock().ok().and_then(|contracts| {
            contracts
                .get(circle_id_hash)
                .filter(|contract| contract.is_active_at(now))
                .cloned()
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, HoldingContract>>, StoreError> {
        self.contracts
            .lock()
            .map_err(|_| internal_error("holding contract store lock poisoned"))
    }
}
