//! realms
//!
//! The realms module handles everything regarding managing realms and the
//! realm list served to clients after login.

use async_trait::async_trait;
use derive_more::{Display, From, Into};
use enumflags2::bitflags;
use num_enum::IntoPrimitive;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// The various flags that a realm can have, shown to the client in the
/// realm list.
#[repr(u8)]
#[bitflags]
#[derive(Clone, Copy, Debug)]
pub enum RealmFlags {
    Invalid = 0b0000_0001,
    Offline = 0b0000_0010,
    SpecifyBuild = 0b0000_0100,
    Unknown1 = 0b0000_1000,
    Unknown2 = 0b0001_0000,
    Recommended = 0b0010_0000,
    New = 0b0100_0000,
    Full = 0b1000_0000,
}

/// The various types of realm.
#[repr(u8)]
#[derive(Clone, Copy, Type, Debug, IntoPrimitive, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum RealmType {
    Normal = 0,
    PVP = 1,
    RP = 6,
    RPPvP = 8,
}

/// An id for a realm.
#[derive(Type, Clone, Debug, Display, From, Into, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct RealmId(pub u32);

/// A realm, as registered in the realm registry and served in the realm
/// list. `internal_name` and `shared_secret` authenticate the realm↔login
/// uplink and are never sent to the game client; `name`, `external_address`
/// and `port` are what the realm last registered with and are what clients
/// see.
#[derive(Clone, Debug)]
pub struct RealmDescriptor {
    pub id: RealmId,
    pub internal_name: String,
    pub name: String,
    pub realm_type: RealmType,
    pub build: u32,
    pub external_address: String,
    pub port: u16,
    pub flags: u8, // BitFlags<RealmFlags>
    pub timezone: u8,
    pub population: f32,
    pub shared_secret: [u8; 32],
}

impl RealmDescriptor {
    /// Whether the realm is currently marked reachable.
    pub fn is_online(&self) -> bool {
        self.flags & (RealmFlags::Offline as u8) == 0
    }
}

/// A trait that models the realm registry: the realm list served to
/// clients, and the status updates a realm reports over its uplink.
#[async_trait]
pub trait RealmList {
    /// Returns the list of realms sorted by id, refreshed from storage at
    /// most once per the implementation's cache interval.
    async fn realms(&self) -> Vec<RealmDescriptor>;

    /// Looks up a single realm by id, bypassing the realm-list cache.
    async fn get(&self, id: RealmId) -> Result<RealmDescriptor, RealmListError>;

    /// Looks up a realm by the internal name it registers with, bypassing
    /// the cache (the uplink listener needs this immediately on connect).
    async fn get_by_internal_name(&self, name: &str)
        -> Result<RealmDescriptor, RealmListError>;

    /// Marks a realm online with the visible name, host and port it
    /// supplied during registration.
    async fn set_online(
        &self,
        id: RealmId,
        visible_name: &str,
        host: &str,
        port: u16,
    ) -> Result<(), RealmListError>;

    /// Marks a realm offline, flipping [`RealmFlags::Offline`].
    async fn set_offline(&self, id: RealmId) -> Result<(), RealmListError>;

    /// Marks every realm offline; run at login-service startup so realms
    /// left "online" by a crash drop out of the list until they register
    /// again.
    async fn set_all_offline(&self) -> Result<(), RealmListError>;

    /// Records the realm's reported population for the realm list.
    async fn set_population(&self, id: RealmId, population: f32) -> Result<(), RealmListError>;
}

/// Errors that may occur when querying the realm registry.
#[derive(Error, Debug, Display)]
pub enum RealmListError {
    NotFound(RealmId),
    UnknownName(String),
    PersistError(String),
}
