//! social
//!
//! `aegis_game::social::SocialService` backed by a `character_social`
//! table: one row per `(owner, target)` pair with a friend/ignore
//! bitmask and a free-text note.

use aegis_game::{
    characters::CharacterId,
    social::{SocialEntry, SocialFlag, SocialOpError, SocialService},
};
use async_trait::async_trait;
use enumflags2::BitFlags;
use sqlx::MySqlPool;
use tracing::debug;

const FRIEND_BIT: u8 = SocialFlag::Friend as u8;
const IGNORE_BIT: u8 = SocialFlag::Ignored as u8;

/// The cap on a single character's combined friend/ignore list.
const MAX_SOCIAL_ENTRIES: i64 = 50;

#[derive(Debug)]
pub struct MySQLSocialService {
    pool: MySqlPool,
}

impl MySQLSocialService {
    pub fn new(pool: MySqlPool) -> Self {
        debug!("starting social service");
        Self { pool }
    }

    async fn upsert_flag(
        &self,
        character: CharacterId,
        target: CharacterId,
        bit: u8,
        note: Option<&str>,
    ) -> Result<(), SocialOpError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM character_social WHERE guid = ?",
        )
        .bind(character.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SocialOpError::PersistError(e.to_string()))?;
        if count >= MAX_SOCIAL_ENTRIES {
            return Err(SocialOpError::ListFull(character));
        }

        sqlx::query(
            "INSERT INTO character_social(guid, friend, flags, note) VALUES(?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE flags = flags | VALUES(flags), \
             note = IF(VALUES(note) = '', note, VALUES(note))",
        )
        .bind(character.0)
        .bind(target.0)
        .bind(bit)
        .bind(note.unwrap_or(""))
        .execute(&self.pool)
        .await
        .map_err(|e| SocialOpError::PersistError(e.to_string()))?;

        Ok(())
    }

    async fn clear_flag(
        &self,
        character: CharacterId,
        target: CharacterId,
        bit: u8,
    ) -> Result<(), SocialOpError> {
        sqlx::query(
            "UPDATE character_social SET flags = flags & ~? WHERE guid = ? AND friend = ?",
        )
        .bind(bit)
        .bind(character.0)
        .bind(target.0)
        .execute(&self.pool)
        .await
        .map_err(|e| SocialOpError::PersistError(e.to_string()))?;

        sqlx::query("DELETE FROM character_social WHERE guid = ? AND friend = ? AND flags = 0")
            .bind(character.0)
            .bind(target.0)
            .execute(&self.pool)
            .await
            .map_err(|e| SocialOpError::PersistError(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl SocialService for MySQLSocialService {
    async fn list(&self, character: CharacterId) -> Result<Vec<SocialEntry>, SocialOpError> {
        let rows = sqlx::query_as::<_, (u32, u8, String)>(
            "SELECT friend, flags, note FROM character_social WHERE guid = ? ORDER BY friend",
        )
        .bind(character.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SocialOpError::PersistError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(target, flags, note)| SocialEntry {
                target: CharacterId(target),
                flags: BitFlags::from_bits_truncate(flags),
                note,
            })
            .collect())
    }

    async fn add_friend(
        &self,
        character: CharacterId,
        friend: CharacterId,
        note: &str,
    ) -> Result<(), SocialOpError> {
        self.upsert_flag(character, friend, FRIEND_BIT, Some(note))
            .await
    }

    async fn remove_friend(
        &self,
        character: CharacterId,
        friend: CharacterId,
    ) -> Result<(), SocialOpError> {
        self.clear_flag(character, friend, FRIEND_BIT).await
    }

    async fn add_ignore(
        &self,
        character: CharacterId,
        ignored: CharacterId,
    ) -> Result<(), SocialOpError> {
        self.upsert_flag(character, ignored, IGNORE_BIT, None).await
    }

    async fn remove_ignore(
        &self,
        character: CharacterId,
        ignored: CharacterId,
    ) -> Result<(), SocialOpError> {
        self.clear_flag(character, ignored, IGNORE_BIT).await
    }

    async fn friends_of(
        &self,
        character: CharacterId,
    ) -> Result<Vec<CharacterId>, SocialOpError> {
        sqlx::query_scalar::<_, u32>(
            "SELECT guid FROM character_social WHERE friend = ? AND flags & ?",
        )
        .bind(character.0)
        .bind(FRIEND_BIT)
        .fetch_all(&self.pool)
        .await
        .map(|ids| ids.into_iter().map(CharacterId).collect())
        .map_err(|e| SocialOpError::PersistError(e.to_string()))
    }

    async fn can_whisper(
        &self,
        sender: CharacterId,
        recipient: CharacterId,
    ) -> Result<bool, SocialOpError> {
        let blocked = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM character_social WHERE guid = ? AND friend = ? AND flags & ?",
        )
        .bind(recipient.0)
        .bind(sender.0)
        .bind(IGNORE_BIT)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SocialOpError::PersistError(e.to_string()))?;

        Ok(blocked == 0)
    }

    async fn remove_everywhere(&self, character: CharacterId) -> Result<(), SocialOpError> {
        sqlx::query("DELETE FROM character_social WHERE guid = ? OR friend = ?")
            .bind(character.0)
            .bind(character.0)
            .execute(&self.pool)
            .await
            .map_err(|e| SocialOpError::PersistError(e.to_string()))?;

        Ok(())
    }
}
