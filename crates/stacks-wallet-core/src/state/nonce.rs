use std::collections::BTreeMap;

/// Next nonce to use per `(address, network url)`, ahead of what the node has indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalNonces {
    nonces: BTreeMap<(String, String), u64>,
}

impl LocalNonces {
    pub fn get(&self, address: &str, network_url: &str) -> Option<u64> {
        self.nonces.get(&(address.to_string(), network_url.to_string())).copied()
    }

    /// Records that `used_nonce` went out, so the next transaction uses the one after.
    pub fn set_latest(&mut self, address: &str, network_url: &str, used_nonce: u64) {
        self.nonces
            .insert((address.to_string(), network_url.to_string()), used_nonce.saturating_add(1));
    }
}
