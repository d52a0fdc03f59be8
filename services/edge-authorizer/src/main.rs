//! Edge Authorizer - Main Entry Point
//!
//! Reads one trigger event as JSON from stdin, runs it through the adapter
//! selected by `TRIGGER_MODE` and writes the response JSON to stdout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{error, info};

use edge_authorizer::api::ApiHandler;
use edge_authorizer::dispatch::{Dispatcher, InboundEvent};
use edge_authorizer::error::EdgeAuthError;
use edge_authorizer::handler::InvocationContext;
use edge_authorizer::jwt::TokenAuthenticator;
use edge_authorizer::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("loading configuration")?;

    rust_common::init_tracing(&config.tracing_config()).context("initializing tracing")?;

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("reading event from stdin")?;
    let event: Value = serde_json::from_str(&raw).context("event is not JSON")?;

    let authenticator = Arc::new(TokenAuthenticator::from_config(&config)?);
    let dispatcher = Dispatcher::new(Arc::new(ApiHandler::new(authenticator)), &config);

    let mut context = InvocationContext::new(Duration::from_secs(config.runtime_timeout_secs));
    if let Ok(version) = std::env::var("FUNCTION_VERSION") {
        context = context.with_function_version(version);
    }
    info!(
        invocation_id = %context.invocation_id,
        trigger_mode = ?config.trigger_mode,
        version = ?context.function_version,
        "Handling invocation"
    );

    let output = match InboundEvent::parse(config.trigger_mode, event) {
        Ok(event) => dispatcher.dispatch(event, &context).await,
        Err(err) => Err(err),
    };

    let body = match output {
        Ok(output) => output.to_json(),
        Err(EdgeAuthError::Handler(rejection)) => {
            info!(code = %rejection.code, "Authorizer rejected request");
            json!({ "errorMessage": "Unauthorized" })
        }
        Err(err) => {
            error!(error_code = err.code().as_str(), error = %err, "Invocation failed");
            return Err(err.into());
        }
    };

    let mut stdout = tokio::io::stdout();
    stdout.write_all(body.to_string().as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
