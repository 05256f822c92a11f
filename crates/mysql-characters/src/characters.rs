//! characters
//!
//! `aegis_game::characters::CharacterService` backed by a MySQL
//! `characters` table, with side tables for spells, action buttons and
//! starter inventory.

use aegis_game::{
    accounts::AccountId,
    characters::{
        ActionButton, Character, CharacterId, CharacterOpError, CharacterService,
        CharacterSnapshot, InventorySlot, NewCharacter, StarterKit,
    },
};
use async_trait::async_trait;
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, instrument};

#[derive(Debug)]
pub struct MySQLCharacterService {
    pool: MySqlPool,
    max_characters_per_account: usize,
}

impl MySQLCharacterService {
    pub fn new(pool: MySqlPool, max_characters_per_account: usize) -> Self {
        debug!("starting character service");
        Self {
            pool,
            max_characters_per_account,
        }
    }
}

#[derive(FromRow)]
struct CharacterRow {
    guid: u32,
    account: u32,
    name: String,
    level: u8,
    race: u8,
    class: u8,
    gender: u8,
    skin_color: u8,
    face: u8,
    hair_style: u8,
    hair_color: u8,
    facial_style: u8,
    zone: u32,
    map: u32,
    position_x: f32,
    position_y: f32,
    position_z: f32,
    orientation: f32,
    money: u32,
    at_login_rename: bool,
}

impl From<CharacterRow> for Character {
    fn from(row: CharacterRow) -> Self {
        Character {
            id: CharacterId(row.guid),
            account: AccountId(row.account),
            name: row.name,
            level: row.level,
            race: row.race,
            class: row.class,
            gender: row.gender,
            skin_color: row.skin_color,
            face: row.face,
            hair_style: row.hair_style,
            hair_color: row.hair_color,
            facial_style: row.facial_style,
            zone: row.zone,
            map: row.map,
            position_x: row.position_x,
            position_y: row.position_y,
            position_z: row.position_z,
            orientation: row.orientation,
            money: row.money,
            at_login_rename: row.at_login_rename,
        }
    }
}

const CHARACTER_COLUMNS: &str = "guid, account, name, level, race, class, gender, skin_color, \
face, hair_style, hair_color, facial_style, zone, map, position_x, position_y, position_z, \
orientation, money, at_login_rename FROM characters";

#[async_trait]
impl CharacterService for MySQLCharacterService {
    async fn get(&self, id: CharacterId) -> Result<Character, CharacterOpError> {
        sqlx::query_as::<_, CharacterRow>(&format!("SELECT {CHARACTER_COLUMNS} WHERE guid = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?
            .map(Into::into)
            .ok_or(CharacterOpError::NotFound(id))
    }

    async fn get_by_name(&self, name: &str) -> Result<Character, CharacterOpError> {
        sqlx::query_as::<_, CharacterRow>(&format!("SELECT {CHARACTER_COLUMNS} WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?
            .map(Into::into)
            .ok_or(CharacterOpError::NotFound(CharacterId(0)))
    }

    async fn get_by_account(&self, id: AccountId) -> Result<Vec<Character>, CharacterOpError> {
        sqlx::query_as::<_, CharacterRow>(&format!(
            "SELECT {CHARACTER_COLUMNS} WHERE account = ? ORDER BY guid"
        ))
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Into::into).collect())
        .map_err(|e| CharacterOpError::PersistError(e.to_string()))
    }

    async fn count_by_account(&self, id: AccountId) -> Result<usize, CharacterOpError> {
        sqlx::query_scalar::<_, i64>("SELECT count(*) FROM characters WHERE account = ?")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await
            .map(|c| c as usize)
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))
    }

    async fn name_available(&self, name: &str) -> Result<bool, CharacterOpError> {
        sqlx::query_scalar::<_, i64>("SELECT count(*) FROM characters WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map(|c| c == 0)
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))
    }

    #[instrument(skip(self, new_character, kit))]
    async fn create_character(
        &self,
        account: AccountId,
        new_character: NewCharacter,
        kit: StarterKit,
    ) -> Result<CharacterId, CharacterOpError> {
        if !self.name_available(&new_character.name).await? {
            return Err(CharacterOpError::NameTaken);
        }

        if self.count_by_account(account).await? >= self.max_characters_per_account {
            return Err(CharacterOpError::TooManyCharacters);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO characters(account, name, level, race, class, gender, skin_color, \
             face, hair_style, hair_color, facial_style, zone, map, position_x, position_y, \
             position_z, orientation, money) VALUES(?, ?, 1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, \
             ?, ?, ?, 0)",
        )
        .bind(account.0)
        .bind(&new_character.name)
        .bind(new_character.race)
        .bind(new_character.class)
        .bind(new_character.gender)
        .bind(new_character.skin_color)
        .bind(new_character.face)
        .bind(new_character.hair_style)
        .bind(new_character.hair_color)
        .bind(new_character.facial_style)
        .bind(kit.zone)
        .bind(kit.map)
        .bind(kit.position.0)
        .bind(kit.position.1)
        .bind(kit.position.2)
        .bind(kit.orientation)
        .execute(&mut tx)
        .await
        .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;

        let id = CharacterId(result.last_insert_id() as u32);

        for spell in &kit.spells {
            sqlx::query("INSERT INTO character_spell(guid, spell) VALUES(?, ?)")
                .bind(id.0)
                .bind(spell)
                .execute(&mut tx)
                .await
                .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;
        }
        for button in &kit.action_buttons {
            sqlx::query(
                "INSERT INTO character_action(guid, button, action, kind) VALUES(?, ?, ?, ?)",
            )
            .bind(id.0)
            .bind(button.button)
            .bind(button.action)
            .bind(button.kind)
            .execute(&mut tx)
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;
        }
        for (slot, (item, count)) in kit.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO character_inventory(guid, slot, item, count) VALUES(?, ?, ?, ?)",
            )
            .bind(id.0)
            .bind(slot as u8)
            .bind(item)
            .bind(count)
            .execute(&mut tx)
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;

        Ok(id)
    }

    #[instrument(skip(self))]
    async fn delete_character(&self, id: CharacterId) -> Result<(), CharacterOpError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;

        let result = sqlx::query("DELETE FROM characters WHERE guid = ?")
            .bind(id.0)
            .execute(&mut tx)
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;

        if result.rows_affected() == 0 {
            // already gone: report it, change nothing
            return Err(CharacterOpError::NotFound(id));
        }

        for table in ["character_spell", "character_action", "character_inventory"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE guid = ?"))
                .bind(id.0)
                .execute(&mut tx)
                .await
                .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn rename_character(&self, id: CharacterId, name: &str) -> Result<(), CharacterOpError> {
        if !self.name_available(name).await? {
            return Err(CharacterOpError::NameTaken);
        }

        let result = sqlx::query(
            "UPDATE characters SET name = ?, at_login_rename = 0 WHERE guid = ?",
        )
        .bind(name)
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CharacterOpError::NotFound(id));
        }

        Ok(())
    }

    async fn persist_snapshot(
        &self,
        snapshot: &CharacterSnapshot,
    ) -> Result<(), CharacterOpError> {
        sqlx::query(
            "UPDATE characters SET level = ?, map = ?, zone = ?, position_x = ?, \
             position_y = ?, position_z = ?, orientation = ?, money = ? WHERE guid = ?",
        )
        .bind(snapshot.level)
        .bind(snapshot.map)
        .bind(snapshot.zone)
        .bind(snapshot.position_x)
        .bind(snapshot.position_y)
        .bind(snapshot.position_z)
        .bind(snapshot.orientation)
        .bind(snapshot.money)
        .bind(snapshot.id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;

        Ok(())
    }

    async fn action_buttons(
        &self,
        id: CharacterId,
    ) -> Result<Vec<ActionButton>, CharacterOpError> {
        sqlx::query_as::<_, (u8, u32, u8)>(
            "SELECT button, action, kind FROM character_action WHERE guid = ? ORDER BY button",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map(|rows| {
            rows.into_iter()
                .map(|(button, action, kind)| ActionButton { button, action, kind })
                .collect()
        })
        .map_err(|e| CharacterOpError::PersistError(e.to_string()))
    }

    async fn set_action_buttons(
        &self,
        id: CharacterId,
        buttons: &[ActionButton],
    ) -> Result<(), CharacterOpError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;

        sqlx::query("DELETE FROM character_action WHERE guid = ?")
            .bind(id.0)
            .execute(&mut tx)
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;

        for button in buttons {
            sqlx::query(
                "INSERT INTO character_action(guid, button, action, kind) VALUES(?, ?, ?, ?)",
            )
            .bind(id.0)
            .bind(button.button)
            .bind(button.action)
            .bind(button.kind)
            .execute(&mut tx)
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))
    }

    async fn spells(&self, id: CharacterId) -> Result<Vec<u32>, CharacterOpError> {
        sqlx::query_scalar::<_, u32>("SELECT spell FROM character_spell WHERE guid = ?")
            .bind(id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))
    }

    async fn learn_spell(&self, id: CharacterId, spell: u32) -> Result<(), CharacterOpError> {
        sqlx::query("INSERT IGNORE INTO character_spell(guid, spell) VALUES(?, ?)")
            .bind(id.0)
            .bind(spell)
            .execute(&self.pool)
            .await
            .map_err(|e| CharacterOpError::PersistError(e.to_string()))?;

        Ok(())
    }

    async fn inventory(&self, id: CharacterId) -> Result<Vec<InventorySlot>, CharacterOpError> {
        sqlx::query_as::<_, (u8, u32, u8)>(
            "SELECT slot, item, count FROM character_inventory WHERE guid = ? ORDER BY slot",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map(|rows| {
            rows.into_iter()
                .map(|(slot, item, count)| InventorySlot { slot, item, count })
                .collect()
        })
        .map_err(|e| CharacterOpError::PersistError(e.to_string()))
    }
}
