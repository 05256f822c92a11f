//! conf
//!
//! The realm service's on-disk configuration: the client-facing bind, the
//! world-node bind, the realm's registry identity (id, internal name,
//! shared secret) used on the login↔realm uplink, and the character
//! database this realm owns. Account data is never read directly; it
//! arrives over the uplink.

use std::net::Ipv4Addr;

use aegis_game::realms::RealmId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorldServerConfig {
    pub bind_address: Ipv4Addr,
    /// Game clients connect here; also what the realm list advertises.
    pub port: u16,
    /// World nodes connect here.
    pub world_node_port: u16,

    pub realm_id: RealmId,
    pub internal_name: String,
    pub shared_secret: [u8; 32],
    /// What the realm list shows players.
    pub visible_name: String,
    /// The host the realm list advertises for this realm.
    pub external_address: String,
    pub login_uplink_address: String,

    pub character_database: String,

    pub motd: Vec<String>,
    pub player_capacity: u32,
    pub session_idle_timeout_secs: u64,
    pub transfer_timeout_secs: u64,
}

impl WorldServerConfig {
    pub fn read(path: &std::path::Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("could not open config file {}", path.display()))?;
        serde_yaml::from_reader(file).context("could not parse config file")
    }

    pub fn write(&self, path: &std::path::Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("could not create config file {}", path.display()))?;
        serde_yaml::to_writer(file, self).context("could not write config file")
    }
}

impl Default for WorldServerConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            port: 8085,
            world_node_port: 8086,
            realm_id: RealmId(1),
            internal_name: "aegis-realm-1".to_string(),
            shared_secret: [0u8; 32],
            visible_name: "Aegis".to_string(),
            external_address: "127.0.0.1".to_string(),
            login_uplink_address: "127.0.0.1:3725".to_string(),
            character_database: "mysql://localhost/characters".to_string(),
            motd: vec!["Welcome to an Aegis realm.".to_string()],
            player_capacity: 1000,
            session_idle_timeout_secs: 300,
            transfer_timeout_secs: 30,
        }
    }
}
