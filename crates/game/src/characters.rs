//! characters
//!
//! Character records as seen by the realm's char-select and char-create/
//! delete/rename operations, plus the in-world shadow the realm keeps
//! while a character is placed on a world node.

use async_trait::async_trait;
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::accounts::AccountId;

/// An id for a character.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Type, From, Into, Serialize, Deserialize, Hash,
)]
#[sqlx(transparent)]
pub struct CharacterId(pub u32);

/// A character record.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub id: CharacterId,
    pub account: AccountId,
    pub name: String,
    pub level: u8,
    pub race: u8,
    pub class: u8,
    pub gender: u8,

    pub skin_color: u8,
    pub face: u8,
    pub hair_style: u8,
    pub hair_color: u8,
    pub facial_style: u8,

    pub zone: u32,
    pub map: u32,
    pub position_x: f32,
    pub position_y: f32,
    pub position_z: f32,
    pub orientation: f32,

    pub money: u32,

    /// Set when a name change has been forced on this character; blocks
    /// `PlayerLogin` and gates `CharRename` until the rename happens.
    pub at_login_rename: bool,
}

/// Appearance and starting-stats fields supplied by `CHAR_CREATE`.
#[derive(Debug, Clone)]
pub struct NewCharacter {
    pub name: String,
    pub race: u8,
    pub class: u8,
    pub gender: u8,
    pub skin_color: u8,
    pub face: u8,
    pub hair_style: u8,
    pub hair_color: u8,
    pub facial_style: u8,
}

/// Everything a freshly created character starts with, derived from the
/// race/class tables: spawn location, starter spells, default action bars
/// and starter inventory.
#[derive(Debug, Clone)]
pub struct StarterKit {
    pub map: u32,
    pub zone: u32,
    pub position: (f32, f32, f32),
    pub orientation: f32,
    pub spells: Vec<u32>,
    pub action_buttons: Vec<ActionButton>,
    /// `(item id, count)` pairs.
    pub items: Vec<(u32, u8)>,
}

/// One action-bar slot binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    pub button: u8,
    pub action: u32,
    pub kind: u8,
}

/// One occupied inventory slot, as handed to a world node on placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventorySlot {
    pub slot: u8,
    pub item: u32,
    pub count: u8,
}

/// The realm-side shadow of a character placed on a world node. The world
/// node owns the authoritative state; the realm's copy is refreshed by
/// world→realm state-sync frames and written back to the store on logout
/// and on each sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub id: CharacterId,
    pub name: String,
    pub race: u8,
    pub class: u8,
    pub gender: u8,
    pub level: u8,

    pub map: u32,
    pub zone: u32,
    pub position_x: f32,
    pub position_y: f32,
    pub position_z: f32,
    pub orientation: f32,

    /// Hearthstone bind point, sent to the client on world entry.
    pub home_map: u32,
    pub home_zone: u32,
    pub home_position: (f32, f32, f32),

    pub money: u32,
    pub spells: Vec<u32>,
}

impl CharacterSnapshot {
    /// The shadow to hand a world node when a stored character first
    /// enters the world: position and bind point straight from the row,
    /// spells as recorded at last save.
    pub fn from_character(character: &Character, spells: Vec<u32>, money: u32) -> Self {
        Self {
            id: character.id,
            name: character.name.clone(),
            race: character.race,
            class: character.class,
            gender: character.gender,
            level: character.level,
            map: character.map,
            zone: character.zone,
            position_x: character.position_x,
            position_y: character.position_y,
            position_z: character.position_z,
            orientation: character.orientation,
            home_map: character.map,
            home_zone: character.zone,
            home_position: (
                character.position_x,
                character.position_y,
                character.position_z,
            ),
            money,
            spells,
        }
    }

    /// Moves the shadow to a new location, as reported by a world node.
    pub fn relocate(&mut self, map: u32, zone: u32, position: (f32, f32, f32), orientation: f32) {
        self.map = map;
        self.zone = zone;
        self.position_x = position.0;
        self.position_y = position.1;
        self.position_z = position.2;
        self.orientation = orientation;
    }
}

/// The character store contract: the roster a login↔char-select flow
/// needs, name lookups for whispers and queries, and the state writeback
/// path for world→realm character-data syncs.
#[async_trait]
pub trait CharacterService {
    async fn get(&self, id: CharacterId) -> Result<Character, CharacterOpError>;
    async fn get_by_name(&self, name: &str) -> Result<Character, CharacterOpError>;
    async fn get_by_account(&self, id: AccountId) -> Result<Vec<Character>, CharacterOpError>;
    async fn count_by_account(&self, id: AccountId) -> Result<usize, CharacterOpError>;
    async fn name_available(&self, name: &str) -> Result<bool, CharacterOpError>;
    async fn create_character(
        &self,
        account: AccountId,
        new_character: NewCharacter,
        kit: StarterKit,
    ) -> Result<CharacterId, CharacterOpError>;

    /// Deletes a character. A second call for the same id reports
    /// [`CharacterOpError::NotFound`] without further side effects.
    async fn delete_character(&self, id: CharacterId) -> Result<(), CharacterOpError>;

    /// Renames a character, clearing the `at_login_rename` flag.
    async fn rename_character(&self, id: CharacterId, name: &str) -> Result<(), CharacterOpError>;

    /// Writes a world-reported state sync back to the store.
    async fn persist_snapshot(&self, snapshot: &CharacterSnapshot) -> Result<(), CharacterOpError>;

    async fn action_buttons(&self, id: CharacterId)
        -> Result<Vec<ActionButton>, CharacterOpError>;
    async fn set_action_buttons(
        &self,
        id: CharacterId,
        buttons: &[ActionButton],
    ) -> Result<(), CharacterOpError>;

    /// The spell ids the character knows, as recorded at last save.
    async fn spells(&self, id: CharacterId) -> Result<Vec<u32>, CharacterOpError>;
    async fn learn_spell(&self, id: CharacterId, spell: u32) -> Result<(), CharacterOpError>;

    /// The character's stored inventory, for the world node on placement.
    async fn inventory(&self, id: CharacterId)
        -> Result<Vec<InventorySlot>, CharacterOpError>;
}

/// Errors that may occur when running character operations.
#[derive(Error, Debug, Display)]
pub enum CharacterOpError {
    NameTaken,
    NameInvalid,
    TooManyCharacters,
    NotFound(CharacterId),
    PersistError(String),
}
