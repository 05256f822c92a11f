//! conf
//!
//! The login service's on-disk configuration: bind addresses and the
//! account database connection string. No environment-variable contract
//! is load-bearing; everything lives in this file.

use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthServerConfig {
    pub bind_address: Ipv4Addr,
    pub port: u16,
    pub realm_uplink_port: u16,
    pub login_database: String,
}

impl AuthServerConfig {
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

impl Default for AuthServerConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            port: 3724,
            realm_uplink_port: 3725,
            login_database: "mysql://localhost/auth".to_string(),
        }
    }
}
