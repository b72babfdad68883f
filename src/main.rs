use std::sync::Arc;

use anyhow::{Context, Result};
use hush::{
    cli::invocation_from_args, clock::SystemClock, config::Config, logging::init_tracing,
    runtime, secrets::SecretsEnv,
};

#[tokio::main]
async fn main() -> Result<()> {
    let invocation = invocation_from_args()?;
    let config = Config::load(&invocation.config_path).with_context(|| {
        format!(
            "failed to load config from {}",
            invocation.config_path.display()
        )
    })?;
    let _logging = init_tracing(&config.logging)?;
    let secrets = SecretsEnv::load().context("failed to read secrets from the environment")?;

    runtime::run(config, invocation.command, secrets, Arc::new(SystemClock)).await
}
