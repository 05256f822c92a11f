//! groups
//!
//! `aegis_game::groups::GroupService` backed by `character_group`,
//! `character_group_member` and `character_group_instance` tables. The
//! permission rules live here rather than in SQL so they read the same
//! way the in-memory implementation does.

use aegis_game::{
    characters::CharacterId,
    groups::{Group, GroupId, GroupMember, GroupOpError, GroupRole, GroupService, LootMethod},
};
use async_trait::async_trait;
use sqlx::MySqlPool;
use tracing::debug;

#[derive(Debug)]
pub struct MySQLGroupService {
    pool: MySqlPool,
}

impl MySQLGroupService {
    pub fn new(pool: MySqlPool) -> Self {
        debug!("starting group service");
        Self { pool }
    }

    async fn require_role(
        &self,
        group: GroupId,
        actor: CharacterId,
    ) -> Result<(Group, GroupRole), GroupOpError> {
        let g = self.get(group).await?;
        let role = g.role_of(actor).ok_or(GroupOpError::NotInGroup(actor))?;
        Ok((g, role))
    }
}

fn role_to_db(role: GroupRole) -> u8 {
    match role {
        GroupRole::Leader => 0,
        GroupRole::Assistant => 1,
        GroupRole::Member => 2,
    }
}

fn role_from_db(role: u8) -> GroupRole {
    match role {
        0 => GroupRole::Leader,
        1 => GroupRole::Assistant,
        _ => GroupRole::Member,
    }
}

fn loot_to_db(method: LootMethod) -> u8 {
    match method {
        LootMethod::FreeForAll => 0,
        LootMethod::RoundRobin => 1,
        LootMethod::MasterLooter => 2,
        LootMethod::GroupLoot => 3,
        LootMethod::NeedBeforeGreed => 4,
    }
}

fn loot_from_db(method: u8) -> LootMethod {
    match method {
        0 => LootMethod::FreeForAll,
        1 => LootMethod::RoundRobin,
        2 => LootMethod::MasterLooter,
        4 => LootMethod::NeedBeforeGreed,
        _ => LootMethod::GroupLoot,
    }
}

#[async_trait]
impl GroupService for MySQLGroupService {
    async fn list_ids(&self) -> Result<Vec<GroupId>, GroupOpError> {
        sqlx::query_scalar::<_, u32>("SELECT id FROM character_group ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map(|ids| ids.into_iter().map(GroupId).collect())
            .map_err(|e| GroupOpError::PersistError(e.to_string()))
    }

    async fn get(&self, id: GroupId) -> Result<Group, GroupOpError> {
        let header = sqlx::query_as::<_, (u8, Option<u32>)>(
            "SELECT loot_method, loot_master FROM character_group WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GroupOpError::PersistError(e.to_string()))?
        .ok_or(GroupOpError::NotFound(id))?;

        let members = sqlx::query_as::<_, (u32, u8)>(
            "SELECT guid, role FROM character_group_member WHERE group_id = ? ORDER BY role, guid",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        Ok(Group {
            id,
            members: members
                .into_iter()
                .map(|(guid, role)| GroupMember {
                    character: CharacterId(guid),
                    role: role_from_db(role),
                })
                .collect(),
            loot_method: loot_from_db(header.0),
            loot_master: header.1.map(CharacterId),
        })
    }

    async fn group_of(&self, character: CharacterId) -> Result<Option<Group>, GroupOpError> {
        let id = sqlx::query_scalar::<_, u32>(
            "SELECT group_id FROM character_group_member WHERE guid = ?",
        )
        .bind(character.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        match id {
            Some(id) => self.get(GroupId(id)).await.map(Some),
            None => Ok(None),
        }
    }

    async fn create_group(&self, leader: CharacterId) -> Result<GroupId, GroupOpError> {
        if self.group_of(leader).await?.is_some() {
            return Err(GroupOpError::AlreadyInGroup(leader));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        let result = sqlx::query("INSERT INTO character_group(loot_method) VALUES(?)")
            .bind(loot_to_db(LootMethod::GroupLoot))
            .execute(&mut tx)
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;
        let id = GroupId(result.last_insert_id() as u32);

        sqlx::query("INSERT INTO character_group_member(group_id, guid, role) VALUES(?, ?, ?)")
            .bind(id.0)
            .bind(leader.0)
            .bind(role_to_db(GroupRole::Leader))
            .execute(&mut tx)
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;
        Ok(id)
    }

    async fn invite(
        &self,
        group: GroupId,
        actor: CharacterId,
        invitee: CharacterId,
    ) -> Result<(), GroupOpError> {
        let (g, role) = self.require_role(group, actor).await?;
        if !role.can_manage() {
            return Err(GroupOpError::PermissionDenied(actor));
        }
        if g.role_of(invitee).is_some() {
            return Err(GroupOpError::AlreadyInGroup(invitee));
        }

        sqlx::query("INSERT INTO character_group_member(group_id, guid, role) VALUES(?, ?, ?)")
            .bind(group.0)
            .bind(invitee.0)
            .bind(role_to_db(GroupRole::Member))
            .execute(&self.pool)
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        Ok(())
    }

    async fn kick(
        &self,
        group: GroupId,
        actor: CharacterId,
        target: CharacterId,
    ) -> Result<(), GroupOpError> {
        let (g, actor_role) = self.require_role(group, actor).await?;
        let target_role = g.role_of(target).ok_or(GroupOpError::NotInGroup(target))?;
        if actor != target {
            if !actor_role.can_manage() {
                return Err(GroupOpError::PermissionDenied(actor));
            }
            // an assistant may never remove the leader
            if target_role == GroupRole::Leader && actor_role != GroupRole::Leader {
                return Err(GroupOpError::PermissionDenied(actor));
            }
        }

        sqlx::query("DELETE FROM character_group_member WHERE group_id = ? AND guid = ?")
            .bind(group.0)
            .bind(target.0)
            .execute(&self.pool)
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        Ok(())
    }

    async fn set_leader(
        &self,
        group: GroupId,
        actor: CharacterId,
        new_leader: CharacterId,
    ) -> Result<(), GroupOpError> {
        let (g, actor_role) = self.require_role(group, actor).await?;
        if actor_role != GroupRole::Leader {
            return Err(GroupOpError::PermissionDenied(actor));
        }
        if g.role_of(new_leader).is_none() {
            return Err(GroupOpError::NotInGroup(new_leader));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        sqlx::query(
            "UPDATE character_group_member SET role = ? WHERE group_id = ? AND role = ?",
        )
        .bind(role_to_db(GroupRole::Member))
        .bind(group.0)
        .bind(role_to_db(GroupRole::Leader))
        .execute(&mut tx)
        .await
        .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        sqlx::query("UPDATE character_group_member SET role = ? WHERE group_id = ? AND guid = ?")
            .bind(role_to_db(GroupRole::Leader))
            .bind(group.0)
            .bind(new_leader.0)
            .execute(&mut tx)
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))
    }

    async fn set_assistant(
        &self,
        group: GroupId,
        actor: CharacterId,
        member: CharacterId,
        assistant: bool,
    ) -> Result<(), GroupOpError> {
        let (g, actor_role) = self.require_role(group, actor).await?;
        if actor_role != GroupRole::Leader {
            return Err(GroupOpError::PermissionDenied(actor));
        }
        match g.role_of(member) {
            None => return Err(GroupOpError::NotInGroup(member)),
            Some(GroupRole::Leader) => return Ok(()),
            Some(_) => {}
        }

        let role = if assistant {
            GroupRole::Assistant
        } else {
            GroupRole::Member
        };
        sqlx::query("UPDATE character_group_member SET role = ? WHERE group_id = ? AND guid = ?")
            .bind(role_to_db(role))
            .bind(group.0)
            .bind(member.0)
            .execute(&self.pool)
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        Ok(())
    }

    async fn set_loot_method(
        &self,
        group: GroupId,
        actor: CharacterId,
        method: LootMethod,
        master: Option<CharacterId>,
    ) -> Result<(), GroupOpError> {
        let (_, actor_role) = self.require_role(group, actor).await?;
        if actor_role != GroupRole::Leader {
            return Err(GroupOpError::PermissionDenied(actor));
        }

        sqlx::query("UPDATE character_group SET loot_method = ?, loot_master = ? WHERE id = ?")
            .bind(loot_to_db(method))
            .bind(master.map(|m| m.0))
            .bind(group.0)
            .execute(&self.pool)
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        Ok(())
    }

    async fn disband(&self, group: GroupId, actor: CharacterId) -> Result<(), GroupOpError> {
        let (_, actor_role) = self.require_role(group, actor).await?;
        if actor_role != GroupRole::Leader {
            return Err(GroupOpError::PermissionDenied(actor));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        for table in [
            "character_group_member",
            "character_group_instance",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE group_id = ?"))
                .bind(group.0)
                .execute(&mut tx)
                .await
                .map_err(|e| GroupOpError::PersistError(e.to_string()))?;
        }
        sqlx::query("DELETE FROM character_group WHERE id = ?")
            .bind(group.0)
            .execute(&mut tx)
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| GroupOpError::PersistError(e.to_string()))
    }

    async fn add_instance_binding(
        &self,
        group: GroupId,
        map: u32,
        instance: u32,
    ) -> Result<(), GroupOpError> {
        sqlx::query(
            "REPLACE INTO character_group_instance(group_id, map, instance) VALUES(?, ?, ?)",
        )
        .bind(group.0)
        .bind(map)
        .bind(instance)
        .execute(&self.pool)
        .await
        .map_err(|e| GroupOpError::PersistError(e.to_string()))?;

        Ok(())
    }

    async fn instance_binding(
        &self,
        group: GroupId,
        map: u32,
    ) -> Result<Option<u32>, GroupOpError> {
        sqlx::query_scalar::<_, u32>(
            "SELECT instance FROM character_group_instance WHERE group_id = ? AND map = ?",
        )
        .bind(group.0)
        .bind(map)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GroupOpError::PersistError(e.to_string()))
    }
}
