/// Tag carried by every message emitted by the wallet.
pub const MESSAGE_SOURCE: &str = "stacks-wallet";

/// Payload relayed in place of a signed response when the user walks away from a request.
pub const CANCELLED_RESPONSE: &str = "cancel";

pub const DEFAULT_GAIA_HUB_URL: &str = "https://hub.blockstack.org";

/// Debounce applied to field validators hitting the network, in milliseconds.
pub const HUMAN_REACTION_DEBOUNCE_TIME: u64 = 200;

pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

pub const MICROSTACKS_IN_STACKS: u64 = 1_000_000;

/// Fees above this amount (in micro-STX) require an explicit confirmation.
pub const HIGH_FEE_AMOUNT_USTX: u64 = 5 * MICROSTACKS_IN_STACKS;

pub const STX_DECIMALS: usize = 6;

pub const MEMO_MAX_BYTES: usize = 34;

pub const LOCAL_DATA_KEY_PREFIX: &str = "stacks-wallet";

pub const AUTH_REQUEST_PARAM: &str = "authRequest";
pub const TRANSACTION_REQUEST_PARAM: &str = "request";

pub const CHAIN_ID_MAINNET: u32 = 0x00000001;
pub const CHAIN_ID_TESTNET: u32 = 0x80000000;

pub const DEFAULT_NETWORK_KEY: &str = "mainnet";
