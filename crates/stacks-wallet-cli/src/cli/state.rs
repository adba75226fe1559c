use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use stacks_wallet_core::kit::services::HubProbe;
use stacks_wallet_core::settings::WalletSettings;
use stacks_wallet_core::state::storage::StorageConfig;
use stacks_wallet_core::state::AppState;
use stacks_wallet_core::validation::{validate_hub_url, GaiaHubClient};
use stacks_wallet_core::Context;

use super::{ResetStorage, SetStorage, UseNetwork};

fn load_state(settings: &WalletSettings, ctx: &Context) -> Result<AppState, String> {
    let store = settings
        .open_local_store()
        .map_err(|e| format!("Failed to open local state: {}", e))?;
    ctx.try_log(|logger| debug!(logger, "Using local state at {}", store.path().display()));
    Ok(AppState::load(ctx, Box::new(store)))
}

pub fn handle_storage_show(settings: &WalletSettings, ctx: &Context) -> Result<(), String> {
    let state = load_state(settings, ctx)?;
    match state.storage_config().own_gaia_hub_url.as_deref() {
        Some(url) => println!("{}", url),
        None => println!("{} (default)", settings.default_gaia_hub_url),
    }
    Ok(())
}

pub async fn handle_storage_set(
    cmd: &SetStorage,
    settings: &WalletSettings,
    ctx: &Context,
) -> Result<(), String> {
    let url = validate_hub_url(&cmd.url)?;
    let url = url.as_str().trim_end_matches('/').to_string();

    if cmd.skip_probe {
        println!("{} Skipping hub probe", yellow!("→"));
    } else if !GaiaHubClient::new(settings.probe_timeout()).probe(&url).await {
        return Err(format!("Unable to reach a Gaia hub at {}", url));
    }

    let mut state = load_state(settings, ctx)?;
    state.update_storage_config(StorageConfig::with_hub(&url)).map_err(|e| e.to_string())?;
    println!("{} Storage endpoint set to {}", green!("✓"), url);
    Ok(())
}

pub fn handle_storage_reset(
    cmd: &ResetStorage,
    settings: &WalletSettings,
    ctx: &Context,
) -> Result<(), String> {
    let mut state = load_state(settings, ctx)?;
    let Some(current) = state.storage_config().own_gaia_hub_url.clone() else {
        println!("Storage endpoint is already the default");
        return Ok(());
    };

    if !cmd.yes {
        let confirm = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Forget {} and use {}?", current, settings.default_gaia_hub_url))
            .interact()
            .map_err(|e| format!("Failed to read confirmation: {}", e))?;
        if !confirm {
            return Ok(());
        }
    }

    state.update_storage_config(StorageConfig::default()).map_err(|e| e.to_string())?;
    println!("{} Storage endpoint reset to {}", green!("✓"), settings.default_gaia_hub_url);
    Ok(())
}

pub fn handle_network_show(settings: &WalletSettings, ctx: &Context) -> Result<(), String> {
    let state = load_state(settings, ctx)?;
    let current = state.current_network_key();
    for (key, network) in state.networks().iter() {
        let marker = if *key == current { format!("{}", green!("*")) } else { " ".to_string() };
        println!("{} {:<8} {} (chain id {:#010x})", marker, key, network.url, network.chain_id);
    }
    Ok(())
}

pub fn handle_network_use(
    cmd: &UseNetwork,
    settings: &WalletSettings,
    ctx: &Context,
) -> Result<(), String> {
    let mut state = load_state(settings, ctx)?;
    state.set_current_network_key(&cmd.key).map_err(|e| e.to_string())?;
    let network = state.current_network().map_err(|e| e.to_string())?;
    println!("{} Now using {}", green!("✓"), network.name);
    Ok(())
}
