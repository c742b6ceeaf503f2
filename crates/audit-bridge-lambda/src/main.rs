// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use audit_bridge::{
    config::{normalize_log_level, Config, ENV_LOG_LEVEL},
    handler::Bridge,
    http::client_from_config,
    identity::resolve_account_id,
    ingest::AuditIngestApi,
    runtime::RuntimeClient,
};

#[tokio::main(flavor = "current_thread")]
pub async fn main() {
    let log_level = env::var(ENV_LOG_LEVEL)
        .ok()
        .and_then(|val| normalize_log_level(&val))
        .unwrap_or("info");

    let env_filter = format!("h2=off,hyper=off,rustls=off,reqwest=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on audit bridge startup: {e}");
            return;
        }
    };

    if config.credentials.is_none() {
        warn!("No AWS credentials in the environment, requests are sent unsigned");
    }

    let client = match client_from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("{e}");
            return;
        }
    };

    let recipient_account_id = match resolve_account_id(&config, &client).await {
        Ok(account_id) => account_id,
        Err(e) => {
            error!("Unable to start audit bridge: {e}");
            return;
        }
    };

    let runtime = match RuntimeClient::from_env() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Unable to reach the function runtime: {e}");
            return;
        }
    };

    let bridge = Bridge::from_config(
        &config,
        recipient_account_id,
        AuditIngestApi::from_config(client, &config),
    );

    info!(
        "Audit bridge ready, forwarding Administrative log entries to {}",
        bridge.channel()
    );

    runtime.run(&bridge).await;
}
