use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use stacks_wallet_core::settings::WalletSettings;
use stacks_wallet_core::Context;

mod requests;
mod state;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    /// Path to a settings file (defaults to the system config directory)
    #[arg(long = "settings", short = 's', global = true)]
    pub settings_path: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Decode and verify an authentication or transaction request token
    #[clap(name = "decode", bin_name = "decode")]
    Decode(DecodeRequest),
    /// Check that a Gaia hub answers with a usable hub_info document
    #[clap(name = "probe", bin_name = "probe")]
    Probe(ProbeHub),
    /// Inspect or change the persisted storage endpoint
    #[clap(subcommand, name = "storage", bin_name = "storage")]
    Storage(StorageCommand),
    /// Inspect or change the persisted network selection
    #[clap(subcommand, name = "network", bin_name = "network")]
    Network(NetworkCommand),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct DecodeRequest {
    /// Request token, or a query string carrying `authRequest=` or `request=`
    pub token: String,
    /// Decode as a transaction request only
    #[arg(long = "transaction", short = 't', conflicts_with = "auth")]
    pub transaction: bool,
    /// Decode as an authentication request only
    #[arg(long = "auth", short = 'a')]
    pub auth: bool,
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct ProbeHub {
    /// Hub url, e.g. https://hub.blockstack.org
    pub url: String,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
pub enum StorageCommand {
    /// Print the storage endpoint in use
    #[clap(name = "show", bin_name = "show")]
    Show,
    /// Store a custom Gaia hub as the storage endpoint
    #[clap(name = "set", bin_name = "set")]
    Set(SetStorage),
    /// Go back to the default storage endpoint
    #[clap(name = "reset", bin_name = "reset")]
    Reset(ResetStorage),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct SetStorage {
    pub url: String,
    /// Store the url without checking that the hub is reachable
    #[arg(long = "skip-probe")]
    pub skip_probe: bool,
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct ResetStorage {
    /// Do not ask for confirmation
    #[arg(long = "yes", short = 'y')]
    pub yes: bool,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
pub enum NetworkCommand {
    /// List known networks, marking the selected one
    #[clap(name = "show", bin_name = "show")]
    Show,
    /// Select the network used when a request does not pin one
    #[clap(name = "use", bin_name = "use")]
    Use(UseNetwork),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct UseNetwork {
    /// Network key: mainnet, testnet or devnet
    pub key: String,
}

pub fn main() {
    let logger = hiro_system_kit::log::setup_logger();
    let _guard = hiro_system_kit::log::setup_global_logger(logger.clone());
    let ctx = Context::new(logger);

    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            println!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = hiro_system_kit::nestable_block_on(handle_command(opts, &ctx)) {
        ctx.try_log(|logger| error!(logger, "{e}"));
        std::thread::sleep(std::time::Duration::from_millis(500));
        process::exit(1);
    }
}

async fn handle_command(opts: Opts, ctx: &Context) -> Result<(), String> {
    let settings = WalletSettings::load(opts.settings_path.as_deref()).map_err(|e| e.to_string())?;
    match opts.command {
        Command::Decode(cmd) => requests::handle_decode_command(&cmd, ctx),
        Command::Probe(cmd) => requests::handle_probe_command(&cmd, &settings, ctx).await,
        Command::Storage(StorageCommand::Show) => state::handle_storage_show(&settings, ctx),
        Command::Storage(StorageCommand::Set(cmd)) => {
            state::handle_storage_set(&cmd, &settings, ctx).await
        }
        Command::Storage(StorageCommand::Reset(cmd)) => {
            state::handle_storage_reset(&cmd, &settings, ctx)
        }
        Command::Network(NetworkCommand::Show) => state::handle_network_show(&settings, ctx),
        Command::Network(NetworkCommand::Use(cmd)) => {
            state::handle_network_use(&cmd, &settings, ctx)
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(&["stacks-wallet", "probe", "https://hub.me"], Command::Probe(ProbeHub { url: "https://hub.me".into() }))]
    #[test_case(&["stacks-wallet", "storage", "show"], Command::Storage(StorageCommand::Show))]
    #[test_case(
        &["stacks-wallet", "storage", "set", "https://hub.me", "--skip-probe"],
        Command::Storage(StorageCommand::Set(SetStorage { url: "https://hub.me".into(), skip_probe: true }))
    )]
    #[test_case(
        &["stacks-wallet", "storage", "reset", "-y"],
        Command::Storage(StorageCommand::Reset(ResetStorage { yes: true }))
    )]
    #[test_case(
        &["stacks-wallet", "network", "use", "testnet"],
        Command::Network(NetworkCommand::Use(UseNetwork { key: "testnet".into() }))
    )]
    fn parses_commands(args: &[&str], expected: Command) {
        assert_eq!(Opts::try_parse_from(args).unwrap().command, expected);
    }

    #[test]
    fn decode_modes_are_exclusive() {
        assert!(Opts::try_parse_from(["stacks-wallet", "decode", "tok", "-a", "-t"]).is_err());
        let opts = Opts::try_parse_from(["stacks-wallet", "decode", "tok", "--settings", "s.toml"])
            .unwrap();
        assert_eq!(opts.settings_path, Some(PathBuf::from("s.toml")));
    }
}
