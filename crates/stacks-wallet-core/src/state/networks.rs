use kit::types::network::{Network, Networks};
use kit::types::request::RequestNetwork;

pub const NETWORK_KEY: &str = "networkKey";

fn normalize_url(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Key of the known network a request targets, matched on url and, when given, chain id.
pub fn find_matching_network_key(
    request_network: &RequestNetwork,
    networks: &Networks,
) -> Option<String> {
    let url = request_network.url.as_deref()?;
    networks
        .iter()
        .find(|(_, network)| {
            normalize_url(&network.url) == normalize_url(url)
                && request_network.chain_id.map_or(true, |id| id == network.chain_id)
        })
        .map(|(key, _)| key.clone())
}

pub fn resolve_network<'a>(key: &str, networks: &'a Networks) -> Option<&'a Network> {
    networks.get(key)
}
