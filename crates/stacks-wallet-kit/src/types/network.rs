use std::collections::BTreeMap;

use crate::constants::{CHAIN_ID_MAINNET, CHAIN_ID_TESTNET};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,
    pub url: String,
    pub chain_id: u32,
}

impl Network {
    pub fn new(name: &str, url: &str, chain_id: u32) -> Self {
        Self { name: name.to_string(), url: url.to_string(), chain_id }
    }

    pub fn is_mainnet(&self) -> bool {
        self.chain_id == CHAIN_ID_MAINNET
    }

    pub fn broadcast_endpoint(&self) -> String {
        format!("{}/v2/transactions", self.url.trim_end_matches('/'))
    }
}

pub type Networks = BTreeMap<String, Network>;

pub fn default_networks() -> Networks {
    let mut networks = Networks::new();
    networks.insert(
        "mainnet".into(),
        Network::new("Mainnet", "https://stacks-node-api.mainnet.stacks.co", CHAIN_ID_MAINNET),
    );
    networks.insert(
        "testnet".into(),
        Network::new("Testnet", "https://stacks-node-api.testnet.stacks.co", CHAIN_ID_TESTNET),
    );
    networks.insert("devnet".into(), Network::new("Devnet", "http://localhost:3999", CHAIN_ID_TESTNET));
    networks
}
