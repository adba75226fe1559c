use stacks_wallet_core::decoder::{try_decode_request, RequestParams};
use stacks_wallet_core::kit::types::message::ExtensionMethod;
use stacks_wallet_core::kit::types::request::DecodedRequest;
use stacks_wallet_core::settings::WalletSettings;
use stacks_wallet_core::validation::GaiaHubClient;
use stacks_wallet_core::Context;

use super::{DecodeRequest, ProbeHub};

fn methods_for(cmd: &DecodeRequest) -> Vec<ExtensionMethod> {
    match (cmd.auth, cmd.transaction) {
        (true, _) => vec![ExtensionMethod::AuthenticationRequest],
        (_, true) => vec![ExtensionMethod::TransactionRequest],
        _ => vec![ExtensionMethod::AuthenticationRequest, ExtensionMethod::TransactionRequest],
    }
}

pub fn handle_decode_command(cmd: &DecodeRequest, ctx: &Context) -> Result<(), String> {
    let params = RequestParams::from_query(&cmd.token);
    let (methods, token) = match params.request() {
        Some((method, token)) => (vec![method], token.to_string()),
        None => (methods_for(cmd), cmd.token.trim().to_string()),
    };

    let mut failures = vec![];
    for method in methods {
        match try_decode_request(method, &token) {
            Ok(request) => {
                let json = match &request {
                    DecodedRequest::Authentication(auth) => serde_json::to_string_pretty(auth),
                    DecodedRequest::Transaction(tx) => serde_json::to_string_pretty(tx),
                }
                .map_err(|e| format!("Failed to serialize request: {}", e))?;
                println!("{} Valid {}", green!("✓"), method);
                println!("{}", json);
                return Ok(());
            }
            Err(e) => {
                ctx.try_log(|logger| debug!(logger, "Not a valid {}: {}", method, e));
                failures.push(format!("{}: {}", method, e));
            }
        }
    }
    println!("{} Invalid request token", red!("x"));
    for failure in failures.iter() {
        println!("  - {}", failure);
    }
    Err("Unable to decode request".to_string())
}

pub async fn handle_probe_command(
    cmd: &ProbeHub,
    settings: &WalletSettings,
    ctx: &Context,
) -> Result<(), String> {
    let client = GaiaHubClient::new(settings.probe_timeout());
    match client.fetch_hub_info(&cmd.url).await {
        Ok(info) => {
            println!("{} {} is a usable Gaia hub", green!("✓"), cmd.url);
            println!("  read url prefix: {}", info.read_url_prefix);
            if let Some(size) = info.max_file_upload_size_megabytes {
                println!("  max upload size: {} MB", size);
            }
            Ok(())
        }
        Err(e) => {
            ctx.try_log(|logger| debug!(logger, "Probe of {} failed: {}", cmd.url, e));
            println!("{} {} is not a usable Gaia hub: {}", red!("x"), cmd.url, e);
            Err(format!("Unable to reach a Gaia hub at {}", cmd.url))
        }
    }
}
