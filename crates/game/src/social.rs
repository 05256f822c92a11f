//! social
//!
//! Friend/ignore lists. Whispers from an ignored character are dropped
//! silently, and friends get online/offline status broadcasts, checked
//! across realms since a contact may be logged in on a different realm
//! of the same cluster.

use async_trait::async_trait;
use enumflags2::{bitflags, BitFlags};
use thiserror::Error;

use crate::characters::CharacterId;

/// How a contact appears on a character's social list. A single contact
/// can carry both bits (a friend who is temporarily ignored keeps their
/// note).
#[bitflags]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocialFlag {
    Friend = 0b01,
    Ignored = 0b10,
}

/// A single entry on a character's social list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialEntry {
    pub target: CharacterId,
    pub flags: BitFlags<SocialFlag>,
    pub note: String,
}

impl SocialEntry {
    pub fn is_friend(&self) -> bool {
        self.flags.contains(SocialFlag::Friend)
    }

    pub fn is_ignored(&self) -> bool {
        self.flags.contains(SocialFlag::Ignored)
    }
}

/// The friend/ignore list store contract.
#[async_trait]
pub trait SocialService {
    async fn list(&self, character: CharacterId) -> Result<Vec<SocialEntry>, SocialOpError>;

    async fn add_friend(
        &self,
        character: CharacterId,
        friend: CharacterId,
        note: &str,
    ) -> Result<(), SocialOpError>;

    async fn remove_friend(
        &self,
        character: CharacterId,
        friend: CharacterId,
    ) -> Result<(), SocialOpError>;

    async fn add_ignore(
        &self,
        character: CharacterId,
        ignored: CharacterId,
    ) -> Result<(), SocialOpError>;

    async fn remove_ignore(
        &self,
        character: CharacterId,
        ignored: CharacterId,
    ) -> Result<(), SocialOpError>;

    /// Every character that has `character` on their list as a friend:
    /// the set to notify when `character` comes online, logs out or is
    /// deleted.
    async fn friends_of(&self, character: CharacterId)
        -> Result<Vec<CharacterId>, SocialOpError>;

    /// Whether `sender` is allowed to whisper `recipient`: true unless
    /// `recipient` has `sender` on their ignore list.
    async fn can_whisper(
        &self,
        sender: CharacterId,
        recipient: CharacterId,
    ) -> Result<bool, SocialOpError>;

    /// Drops `character` from every other character's list, part of
    /// character deletion.
    async fn remove_everywhere(&self, character: CharacterId) -> Result<(), SocialOpError>;
}

/// Errors that may occur when running social-list operations.
#[derive(Error, Debug)]
pub enum SocialOpError {
    #[error("social list is full for character {0:?}")]
    ListFull(CharacterId),
    #[error("persist error: {0}")]
    PersistError(String),
}
