// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::Config;
use crate::error::BridgeError;
use core::time::Duration;

/// Builds a reqwest client with optional proxy configuration and timeout.
/// Uses rustls TLS.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, BridgeError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(
            reqwest::Proxy::https(proxy).map_err(|e| BridgeError::Http(e.to_string()))?,
        );
    }
    builder.build().map_err(|e| BridgeError::Http(e.to_string()))
}

/// Client shared by every outbound call of the process
pub fn client_from_config(config: &Config) -> Result<reqwest::Client, BridgeError> {
    build_client(config.https_proxy.as_deref(), config.request_timeout)
}
