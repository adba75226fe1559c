use std::collections::BTreeMap;

use kit::constants::{MEMO_MAX_BYTES, MICROSTACKS_IN_STACKS, STX_DECIMALS};
use kit::types::network::Network;
use kit::url::Url;

const C32_ALPHABET: &str = "0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Inline errors keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &&'static str> {
        self.0.keys()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeType {
    Low,
    #[default]
    Middle,
    High,
    Custom,
}

/// Raw values of the send form, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFormValues {
    pub amount: String,
    pub fee: String,
    pub fee_type: FeeType,
    pub memo: String,
    pub nonce: String,
    pub recipient: String,
}

/// What the form is checked against besides its own values.
#[derive(Debug, Clone, Copy)]
pub struct FormContext<'a> {
    pub network: &'a Network,
    pub sender_address: Option<&'a str>,
    pub available_balance: Option<u64>,
    /// Token transfers carry amount, recipient and memo. Other kinds only fee and nonce.
    pub is_token_transfer: bool,
}

/// Values that passed validation, in micro-stacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub amount: Option<u64>,
    pub fee: u64,
    pub nonce: u64,
    pub memo: Option<String>,
    pub recipient: Option<String>,
}

/// Custom storage endpoints must be absolute http(s) urls with a host.
pub fn validate_hub_url(value: &str) -> Result<Url, String> {
    let url = Url::parse(value.trim()).map_err(|e| format!("Invalid url: {}", e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err("The hub url must use http or https".to_string());
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("The hub url must have a host".to_string());
    }
    Ok(url)
}

/// Parses a decimal STX amount into micro-stacks.
pub fn parse_stx_amount(value: &str) -> Result<u64, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("Enter an amount".to_string());
    }
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (value, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err("Amount must be a number".to_string());
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err("Amount must be a number".to_string());
    }
    if fraction.len() > STX_DECIMALS {
        return Err(format!("STX can only have {} decimals", STX_DECIMALS));
    }

    let whole = if whole.is_empty() { 0 } else { whole.parse::<u64>().map_err(|e| e.to_string())? };
    let fraction = format!("{:0<width$}", fraction, width = STX_DECIMALS)
        .parse::<u64>()
        .map_err(|e| e.to_string())?;
    whole
        .checked_mul(MICROSTACKS_IN_STACKS)
        .and_then(|ustx| ustx.checked_add(fraction))
        .ok_or_else(|| "Amount is too large".to_string())
}

pub fn format_ustx(ustx: u64) -> String {
    let whole = ustx / MICROSTACKS_IN_STACKS;
    let fraction = ustx % MICROSTACKS_IN_STACKS;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", fraction, width = STX_DECIMALS);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Shape check of a c32 Stacks address and its network prefix.
pub fn validate_stx_address(address: &str, network: &Network) -> Result<(), String> {
    let address = address.trim();
    let (address, contract) = match address.split_once('.') {
        Some((address, contract)) => (address, Some(contract)),
        None => (address, None),
    };
    if !(28..=41).contains(&address.len()) || !address.starts_with('S') {
        return Err("Invalid Stacks address".to_string());
    }
    if !address[1..].chars().all(|c| C32_ALPHABET.contains(c)) {
        return Err("Invalid Stacks address".to_string());
    }
    let version = &address[1..2];
    let expected: &[&str] = if network.is_mainnet() { &["P", "M"] } else { &["T", "N"] };
    if !expected.contains(&version) {
        return Err(format!("The address is not valid for {}", network.name));
    }
    if let Some(contract) = contract {
        if contract.is_empty() || contract.len() > 40 {
            return Err("Invalid contract name".to_string());
        }
    }
    Ok(())
}

pub fn parse_nonce(value: &str) -> Result<u64, String> {
    value.trim().parse::<u64>().map_err(|_| "Nonce must be a positive integer".to_string())
}

pub fn validate_transaction_form(
    values: &TransactionFormValues,
    ctx: FormContext<'_>,
) -> Result<ValidatedForm, FieldErrors> {
    let mut errors = FieldErrors::new();

    let fee = parse_stx_amount(&values.fee).map_err(|e| errors.insert("fee", e)).ok();
    let nonce = parse_nonce(&values.nonce).map_err(|e| errors.insert("nonce", e)).ok();

    let (mut amount, mut recipient, mut memo) = (None, None, None);
    if ctx.is_token_transfer {
        match parse_stx_amount(&values.amount) {
            Ok(0) => errors.insert("amount", "Amount must be greater than zero"),
            Ok(ustx) => amount = Some(ustx),
            Err(e) => errors.insert("amount", e),
        }

        match validate_stx_address(&values.recipient, ctx.network) {
            Ok(()) if Some(values.recipient.trim()) == ctx.sender_address => {
                errors.insert("recipient", "Cannot send to yourself")
            }
            Ok(()) => recipient = Some(values.recipient.trim().to_string()),
            Err(e) => errors.insert("recipient", e),
        }

        if values.memo.len() > MEMO_MAX_BYTES {
            errors.insert("memo", format!("Memo must be at most {} bytes", MEMO_MAX_BYTES));
        } else if !values.memo.is_empty() {
            memo = Some(values.memo.clone());
        }
    }

    if let (Some(balance), Some(fee)) = (ctx.available_balance, fee) {
        let total = amount.unwrap_or(0).saturating_add(fee);
        if total > balance {
            let field = if ctx.is_token_transfer { "amount" } else { "fee" };
            errors.insert(field, format!("Insufficient balance. Available: {} STX", format_ustx(balance)));
        }
    }

    match (fee, nonce) {
        (Some(fee), Some(nonce)) if errors.is_empty() => {
            Ok(ValidatedForm { amount, fee, nonce, memo, recipient })
        }
        _ => Err(errors),
    }
}
