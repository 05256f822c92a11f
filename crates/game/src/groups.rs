//! groups
//!
//! Party/raid groups: membership, roles, loot method and the per-map
//! instance bindings that keep a group inside the same dungeon copy when
//! its members log in at different times.

use async_trait::async_trait;
use derive_more::{Display, From, Into};
use sqlx::Type;
use thiserror::Error;

use crate::characters::CharacterId;

/// An id for a group.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Type, From, Into)]
#[sqlx(transparent)]
pub struct GroupId(pub u32);

/// A member's standing within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    Leader,
    Assistant,
    Member,
}

impl GroupRole {
    /// Leaders and assistants may invite, kick, raid-warn and change loot
    /// method; plain members may not.
    pub fn can_manage(self) -> bool {
        matches!(self, GroupRole::Leader | GroupRole::Assistant)
    }
}

/// How loot is distributed among a group's members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LootMethod {
    FreeForAll,
    RoundRobin,
    MasterLooter,
    GroupLoot,
    NeedBeforeGreed,
}

/// A group member and their role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMember {
    pub character: CharacterId,
    pub role: GroupRole,
}

/// A party or raid group.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    pub members: Vec<GroupMember>,
    pub loot_method: LootMethod,
    pub loot_master: Option<CharacterId>,
}

impl Group {
    /// The role a character holds in this group, if any.
    pub fn role_of(&self, character: CharacterId) -> Option<GroupRole> {
        self.members
            .iter()
            .find(|m| m.character == character)
            .map(|m| m.role)
    }

    /// The group's leader.
    pub fn leader(&self) -> Option<CharacterId> {
        self.members
            .iter()
            .find(|m| m.role == GroupRole::Leader)
            .map(|m| m.character)
    }
}

/// The group store/management contract.
#[async_trait]
pub trait GroupService {
    /// Every persisted group id, for restoring bindings after a restart.
    async fn list_ids(&self) -> Result<Vec<GroupId>, GroupOpError>;

    async fn get(&self, id: GroupId) -> Result<Group, GroupOpError>;
    async fn group_of(&self, character: CharacterId) -> Result<Option<Group>, GroupOpError>;
    async fn create_group(&self, leader: CharacterId) -> Result<GroupId, GroupOpError>;

    /// Invites `invitee` into `group`. Fails unless `actor` is the leader
    /// or an assistant.
    async fn invite(
        &self,
        group: GroupId,
        actor: CharacterId,
        invitee: CharacterId,
    ) -> Result<(), GroupOpError>;

    /// Removes `target` from `group`. Fails unless `actor` is the leader
    /// or an assistant, or `actor == target` (leaving voluntarily). An
    /// assistant may never kick the leader.
    async fn kick(
        &self,
        group: GroupId,
        actor: CharacterId,
        target: CharacterId,
    ) -> Result<(), GroupOpError>;

    /// Hands leadership to `new_leader`. Only the current leader may.
    async fn set_leader(
        &self,
        group: GroupId,
        actor: CharacterId,
        new_leader: CharacterId,
    ) -> Result<(), GroupOpError>;

    /// Promotes or demotes a member to/from assistant. Only the leader
    /// may.
    async fn set_assistant(
        &self,
        group: GroupId,
        actor: CharacterId,
        member: CharacterId,
        assistant: bool,
    ) -> Result<(), GroupOpError>;

    /// Changes the loot method. Fails unless `actor` is the leader.
    async fn set_loot_method(
        &self,
        group: GroupId,
        actor: CharacterId,
        method: LootMethod,
        master: Option<CharacterId>,
    ) -> Result<(), GroupOpError>;

    async fn disband(&self, group: GroupId, actor: CharacterId) -> Result<(), GroupOpError>;

    /// Pins `group` to a live instance of `map`, so members logging in
    /// later land in the same copy.
    async fn add_instance_binding(
        &self,
        group: GroupId,
        map: u32,
        instance: u32,
    ) -> Result<(), GroupOpError>;

    /// The instance of `map` this group is bound to, if any.
    async fn instance_binding(
        &self,
        group: GroupId,
        map: u32,
    ) -> Result<Option<u32>, GroupOpError>;
}

/// Errors that may occur when running group operations.
#[derive(Error, Debug, Display)]
pub enum GroupOpError {
    NotFound(GroupId),
    NotInGroup(CharacterId),
    AlreadyInGroup(CharacterId),
    PermissionDenied(CharacterId),
    PersistError(String),
}
