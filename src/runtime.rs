use std::{path::Path, sync::Arc};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    signal::unix::{SignalKind, signal},
};
use tokio_util::sync::CancellationToken;

use crate::{
    audit::{
        ATTEMPT_STORE, AttemptStore, AuditPersistence, AuditStore, RECEIPT_STORE,
        RESOLUTION_STORE, ReceiptStore, ResolutionRecord, ResolutionStore,
    },
    cli::Command,
    clock::Clock,
    config::Config,
    delivery::{
        CandidateSource, DeliveryPorts, DeliveryRequest, DeliveryService, EnvelopeSource,
        noop::{AllowAllRateLimit, StaticPolicySource, StaticTrustSource},
        types::TransportKind,
    },
    envelope::types::AttentionEnvelope,
    escalation::{CapSources, PressureInput, UrgencyResolver},
    holding::types::HoldingContract,
    registration::{DeviceRegistration, REGISTRATION_STORE, RegistrationStore, register_device},
    sealed::{ProviderTokenCache, SealedPushTransport, SealedSecretStore},
    secrets::SecretsEnv,
    transport::{PushPayload, StubTransport, Transport, WebhookTransport, clamp_timeout},
    vendor::contract::VendorContract,
};

/// One pressure input plus whatever cap-source records apply to it.
#[derive(Debug, Deserialize)]
pub struct ResolveCommand {
    #[serde(flatten)]
    pub input: PressureInput,
    #[serde(default)]
    pub vendor_contract: Option<VendorContract>,
    #[serde(default)]
    pub envelope: Option<AttentionEnvelope>,
    #[serde(default)]
    pub holding_contract: Option<HoldingContract>,
}


#[derive(Debug, Serialize)]
pub struct PruneReport {
    pub resolutions: usize,
    pub attempts: usize,
    pub receipts: usize,
    pub registrations: usize,
}

/// Audit and registration stores, persistent when a state dir is configured.
pub struct Stores {
    pub resolutions: Arc<ResolutionStore>,
    pub attempts: Arc<AttemptStore>,
    pub receipts: Arc<ReceiptStore>,
    pub registrations: Arc<RegistrationStore>,
}

impl Stores {
    pub fn open(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let limits = config.audit.limits();
        let Some(state_dir) = config.audit.state_dir.as_deref() else {
            return Ok(Self {
                resolutions: Arc::new(AuditStore::in_memory(
                    RESOLUTION_STORE,
                    limits,
                    Arc::clone(&clock),
                )),
                attempts: Arc::new(AuditStore::in_memory(
                    ATTEMPT_STORE,
                    limits,
                    Arc::clone(&clock),
                )),
                receipts: Arc::new(AuditStore::in_memory(
                    RECEIPT_STORE,
                    limits,
                    Arc::clone(&clock),
                )),
                registrations: Arc::new(RegistrationStore::in_memory(limits, clock)),
            });
        };

        Ok(Self {
            resolutions: Arc::new(open_audit(state_dir, RESOLUTION_STORE, config, &clock)?),
            attempts: Arc::new(open_audit(state_dir, ATTEMPT_STORE, config, &clock)?),
            receipts: Arc::new(open_audit(state_dir, RECEIPT_STORE, config, &clock)?),
            registrations: Arc::new(
                RegistrationStore::persistent(
                    limits,
                    clock,
                    AuditPersistence::in_dir(state_dir, REGISTRATION_STORE),
                )
                .with_context(|| format!("failed to open {REGISTRATION_STORE} store"))?,
            ),
        })
    }

    pub fn prune(&self) -> Result<PruneReport> {
        Ok(PruneReport {
            resolutions: self.resolutions.prune()?,
            attempts: self.attempts.prune()?,
            receipts: self.receipts.prune()?,
            registrations: self.registrations.prune()?,
        })
    }
}

fn open_audit<R: crate::audit::AuditRecord>(
    state_dir: &Path,
    name: &'static str,
    config: &Config,
    clock: &Arc<dyn Clock>,
) -> Result<AuditStore<R>> {
    AuditStore::persistent(
        name,
        config.audit.limits(),
        Arc::clone(clock),
        AuditPersistence::in_dir(state_dir, name),
    )
    .with_context(|| format!("failed to open {name} store"))
}

/// Reads one JSON document from stdin, runs the command, writes one JSON
/// document to stdout. SIGINT and SIGTERM cancel in-flight sends.
pub async fn run(
    config: Config,
    command: Command,
    secrets: SecretsEnv,
    clock: Arc<dyn Clock>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone())?;

    let mut input = String::new();
    if command != Command::Prune {
        tokio::io::stdin()
            .read_to_string(&mut input)
            .await
            .context("failed to read command input from stdin")?;
    }

    let output = execute(&config, command, secrets, clock, &cancel, &input).await?;

    let mut stdout = tokio::io::stdout();
    let mut rendered = serde_json::to_vec(&output).context("failed to render command output")?;
    rendered.push(b'\n');
    stdout
        .write_all(&rendered)
        .await
        .context("failed to write command output")?;
    stdout.flush().await.context("failed to flush stdout")?;
    Ok(())
}

pub async fn execute(
    config: &Config,
    command: Command,
    mut secrets: SecretsEnv,
    clock: Arc<dyn Clock>,
    cancel: &CancellationToken,
    input: &str,
) -> Result<Value> {
    let stores = Stores::open(config, Arc::clone(&clock))?;

    match command {
        Command::Resolve => {
            let command: ResolveCommand =
                serde_json::from_str(input).context("invalid resolve input")?;
            let now = clock.now();
            let mut pressure = command.input;
            // The envelope flag follows the supplied record, not the caller.
            pressure.envelope_active = command
                .envelope
                .as_ref()
                .is_some_and(|envelope| envelope.envelope_active(&pressure.circle_id_hash, now));
            let sources = CapSources {
                vendor_contract: command.vendor_contract.as_ref(),
                envelope: command.envelope.as_ref(),
                holding_contract: command.holding_contract.as_ref(),
                at: now,
            };
            let resolution = UrgencyResolver::new().resolve(&pressure, &sources);
            stores.resolutions.append(ResolutionRecord {
                resolution: resolution.clone(),
                recorded_at: clock.now(),
            })?;
            Ok(serde_json::to_value(resolution)?)
        }
        Command::Register => {
            let device: DeviceRegistration =
                serde_json::from_str(input).context("invalid register input")?;
            let sealed = SealedSecretStore::open(
                secrets.take_sealing_key()?,
                config.sealed.data_dir.clone(),
            )
            .context("failed to open sealed secret store")?;
            let registration = register_device(&sealed, &stores.registrations, device)?;
            Ok(serde_json::to_value(registration)?)
        }
        Command::Deliver => {
            // Candidates are resolution hashes; their caps come from the
            // resolution store, never from the request.
            let request: DeliveryRequest =
                serde_json::from_str(input).context("invalid deliver input")?;
            let transport = build_transport(config, &mut secrets)?;
            let service = DeliveryService::new(
                DeliveryPorts {
                    candidates: Arc::clone(&stores.resolutions) as Arc<dyn CandidateSource>,
                    policy: Arc::new(StaticPolicySource::new(config.policy.snapshot())),
                    devices: stores.registrations.clone(),
                    rate_limit: Arc::new(AllowAllRateLimit),
                    trust: Arc::new(StaticTrustSource {
                        baseline: config.policy.trust_baseline,
                        fragile: config.policy.trust_fragile,
                    }),
                },
                transport,
                Arc::clone(&stores.attempts),
                Arc::clone(&stores.receipts),
                clock,
                config.delivery.max_per_day,
            );
            let run = service.deliver(cancel, &request).await?;
            Ok(serde_json::to_value(run.receipt)?)
        }
        Command::Prune => {
            let report = stores.prune()?;
            tracing::info!(
                target: "audit",
                resolutions = report.resolutions,
                attempts = report.attempts,
                receipts = report.receipts,
                registrations = report.registrations,
                "stores_pruned"
            );
            Ok(json!({ "pruned": serde_json::to_value(report)? }))
        }
    }
}

/// Builds the configured sender. Only the APNs sender needs secrets.
pub fn build_transport(config: &Config, secrets: &mut SecretsEnv) -> Result<Arc<dyn Transport>> {
    let timeout = clamp_timeout(config.transport.timeout_ms);
    let payload = Arc::new(PushPayload::default());

    let transport: Arc<dyn Transport> = match config.transport.kind {
        TransportKind::Stub => Arc::new(StubTransport::new()),
        TransportKind::Webhook => {
            let webhook = config
                .transport
                .webhook
                .as_ref()
                .ok_or_else(|| anyhow!("transport.webhook.url is not configured"))?;
            Arc::new(
                WebhookTransport::new(&webhook.url, timeout, payload)
                    .context("failed to build webhook client")?,
            )
        }
        TransportKind::Apns => {
            let store = SealedSecretStore::open(
                secrets.take_sealing_key()?,
                config.sealed.data_dir.clone(),
            )
            .context("failed to open sealed secret store")?;
            let tokens = ProviderTokenCache::new(secrets.take_apns()?);
            Arc::new(
                SealedPushTransport::new(
                    config.transport.apns.environment,
                    timeout,
                    Arc::new(store),
                    Arc::new(tokens),
                    payload,
                )
                .context("failed to build apns client")?,
            )
        }
    };
    Ok(transport)
}

fn spawn_signal_listener(cancel: CancellationToken) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;

    tokio::spawn(async move {
        let signal_name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
            _ = cancel.cancelled() => return,
        };
        tracing::warn!(target: "runtime", signal = signal_name, "shutdown_requested");
        cancel.cancel();
    });
    Ok(())
}
