//! realms
//!
//! `aegis_game::realms::RealmList` backed by a MySQL `realmlist` table,
//! cached with a refresh-on-interval policy so a realm-list flood doesn't
//! turn into a query flood.

use std::time::{Duration, SystemTime};

use aegis_game::realms::{
    RealmDescriptor, RealmFlags, RealmId, RealmList, RealmListError, RealmType,
};
use async_std::sync::RwLock;
use async_trait::async_trait;
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, info};

pub struct MySQLRealmList {
    pool: MySqlPool,
    update_interval: Duration,
    next_update: RwLock<SystemTime>,
    cache: RwLock<Vec<RealmDescriptor>>,
}

impl std::fmt::Debug for MySQLRealmList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySQLRealmList").finish_non_exhaustive()
    }
}

impl MySQLRealmList {
    pub fn new(pool: MySqlPool, update_interval: Duration) -> Self {
        debug!("starting realm list service");
        Self {
            pool,
            update_interval,
            next_update: RwLock::new(SystemTime::now()),
            cache: RwLock::new(Vec::new()),
        }
    }

    /// Invalidates the cache so a status change is visible before the
    /// next scheduled refresh.
    async fn expire_cache(&self) {
        *self.next_update.write().await = SystemTime::now();
    }
}

#[derive(FromRow)]
struct RealmRow {
    id: u32,
    internal_name: String,
    name: String,
    realm_type: u8,
    build: u32,
    external_address: String,
    port: u16,
    flags: u8,
    timezone: u8,
    population: f32,
    shared_secret: Vec<u8>,
}

impl TryFrom<RealmRow> for RealmDescriptor {
    type Error = RealmListError;

    fn try_from(row: RealmRow) -> Result<Self, Self::Error> {
        let realm_type = match row.realm_type {
            0 => RealmType::Normal,
            1 => RealmType::PVP,
            6 => RealmType::RP,
            8 => RealmType::RPPvP,
            _ => RealmType::Normal,
        };
        let shared_secret: [u8; 32] = row
            .shared_secret
            .try_into()
            .map_err(|_| RealmListError::PersistError("malformed shared secret".into()))?;

        Ok(RealmDescriptor {
            id: RealmId(row.id),
            internal_name: row.internal_name,
            name: row.name,
            realm_type,
            build: row.build,
            external_address: row.external_address,
            port: row.port,
            flags: row.flags,
            timezone: row.timezone,
            population: row.population,
            shared_secret,
        })
    }
}

const REALM_COLUMNS: &str = "id, internal_name, name, realm_type, build, external_address, \
port, flags, timezone, population, shared_secret FROM realmlist";

const OFFLINE_BIT: u8 = RealmFlags::Offline as u8;

#[async_trait]
impl RealmList for MySQLRealmList {
    async fn realms(&self) -> Vec<RealmDescriptor> {
        let now = SystemTime::now();
        if now > *self.next_update.read().await {
            debug!("refreshing realm list cache");
            if let Ok(rows) = sqlx::query_as::<_, RealmRow>(&format!(
                "SELECT {REALM_COLUMNS} ORDER BY id"
            ))
            .fetch_all(&self.pool)
            .await
            {
                let realms: Vec<RealmDescriptor> =
                    rows.into_iter().filter_map(|r| r.try_into().ok()).collect();
                *self.cache.write().await = realms;
                *self.next_update.write().await = now + self.update_interval;
            }
        }

        self.cache.read().await.clone()
    }

    async fn get(&self, id: RealmId) -> Result<RealmDescriptor, RealmListError> {
        sqlx::query_as::<_, RealmRow>(&format!("SELECT {REALM_COLUMNS} WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RealmListError::PersistError(e.to_string()))?
            .ok_or(RealmListError::NotFound(id))?
            .try_into()
    }

    async fn get_by_internal_name(
        &self,
        name: &str,
    ) -> Result<RealmDescriptor, RealmListError> {
        sqlx::query_as::<_, RealmRow>(&format!(
            "SELECT {REALM_COLUMNS} WHERE internal_name = ?"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RealmListError::PersistError(e.to_string()))?
        .ok_or_else(|| RealmListError::UnknownName(name.to_string()))?
        .try_into()
    }

    async fn set_online(
        &self,
        id: RealmId,
        visible_name: &str,
        host: &str,
        port: u16,
    ) -> Result<(), RealmListError> {
        info!(%id, visible_name, host, port, "realm online");
        sqlx::query(&format!(
            "UPDATE realmlist SET name = ?, external_address = ?, port = ?, \
             flags = flags & ~{OFFLINE_BIT} WHERE id = ?"
        ))
        .bind(visible_name)
        .bind(host)
        .bind(port)
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| RealmListError::PersistError(e.to_string()))?;

        self.expire_cache().await;
        Ok(())
    }

    async fn set_offline(&self, id: RealmId) -> Result<(), RealmListError> {
        info!(%id, "realm offline");
        sqlx::query(&format!(
            "UPDATE realmlist SET flags = flags | {OFFLINE_BIT} WHERE id = ?"
        ))
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| RealmListError::PersistError(e.to_string()))?;

        self.expire_cache().await;
        Ok(())
    }

    async fn set_all_offline(&self) -> Result<(), RealmListError> {
        sqlx::query(&format!("UPDATE realmlist SET flags = flags | {OFFLINE_BIT}"))
            .execute(&self.pool)
            .await
            .map_err(|e| RealmListError::PersistError(e.to_string()))?;

        self.expire_cache().await;
        Ok(())
    }

    async fn set_population(&self, id: RealmId, population: f32) -> Result<(), RealmListError> {
        sqlx::query("UPDATE realmlist SET population = ? WHERE id = ?")
            .bind(population)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| RealmListError::PersistError(e.to_string()))?;

        Ok(())
    }
}
