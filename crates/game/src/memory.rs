//! memory
//!
//! Process-local implementations of [`GroupService`] and [`SocialService`],
//! used as test fixtures and as a fallback when a realm runs without a
//! character database slice for them. A restart drops everything.

use std::{
    collections::HashMap,
    sync::{Mutex, RwLock},
};

use async_trait::async_trait;
use enumflags2::BitFlags;

use crate::{
    characters::CharacterId,
    groups::{Group, GroupId, GroupMember, GroupOpError, GroupRole, GroupService, LootMethod},
    social::{SocialEntry, SocialFlag, SocialOpError, SocialService},
};

/// An in-memory group registry, keyed by auto-incrementing [`GroupId`].
#[derive(Debug, Default)]
pub struct InMemoryGroupService {
    next_id: Mutex<u32>,
    groups: RwLock<HashMap<GroupId, Group>>,
    bindings: RwLock<HashMap<(GroupId, u32), u32>>,
}

impl InMemoryGroupService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupService for InMemoryGroupService {
    async fn list_ids(&self) -> Result<Vec<GroupId>, GroupOpError> {
        Ok(self
            .groups
            .read()
            .expect("lock poisoned")
            .keys()
            .copied()
            .collect())
    }

    async fn get(&self, id: GroupId) -> Result<Group, GroupOpError> {
        self.groups
            .read()
            .expect("lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(GroupOpError::NotFound(id))
    }

    async fn group_of(&self, character: CharacterId) -> Result<Option<Group>, GroupOpError> {
        Ok(self
            .groups
            .read()
            .expect("lock poisoned")
            .values()
            .find(|g| g.role_of(character).is_some())
            .cloned())
    }

    async fn create_group(&self, leader: CharacterId) -> Result<GroupId, GroupOpError> {
        let mut next_id = self.next_id.lock().expect("lock poisoned");
        *next_id += 1;
        let id = GroupId(*next_id);

        let group = Group {
            id,
            members: vec![GroupMember {
                character: leader,
                role: GroupRole::Leader,
            }],
            loot_method: LootMethod::GroupLoot,
            loot_master: None,
        };
        self.groups.write().expect("lock poisoned").insert(id, group);
        Ok(id)
    }

    async fn invite(
        &self,
        group: GroupId,
        actor: CharacterId,
        invitee: CharacterId,
    ) -> Result<(), GroupOpError> {
        let mut groups = self.groups.write().expect("lock poisoned");
        let g = groups.get_mut(&group).ok_or(GroupOpError::NotFound(group))?;

        match g.role_of(actor) {
            Some(role) if role.can_manage() => {}
            Some(_) => return Err(GroupOpError::PermissionDenied(actor)),
            None => return Err(GroupOpError::NotInGroup(actor)),
        }

        if g.role_of(invitee).is_some() {
            return Err(GroupOpError::AlreadyInGroup(invitee));
        }

        g.members.push(GroupMember {
            character: invitee,
            role: GroupRole::Member,
        });
        Ok(())
    }

    async fn kick(
        &self,
        group: GroupId,
        actor: CharacterId,
        target: CharacterId,
    ) -> Result<(), GroupOpError> {
        let mut groups = self.groups.write().expect("lock poisoned");
        let g = groups.get_mut(&group).ok_or(GroupOpError::NotFound(group))?;

        let actor_role = g.role_of(actor).ok_or(GroupOpError::NotInGroup(actor))?;
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

        g.members.retain(|m| m.character != target);
        Ok(())
    }

    async fn set_leader(
        &self,
        group: GroupId,
        actor: CharacterId,
        new_leader: CharacterId,
    ) -> Result<(), GroupOpError> {
        let mut groups = self.groups.write().expect("lock poisoned");
        let g = groups.get_mut(&group).ok_or(GroupOpError::NotFound(group))?;

        match g.role_of(actor) {
            Some(GroupRole::Leader) => {}
            Some(_) => return Err(GroupOpError::PermissionDenied(actor)),
            None => return Err(GroupOpError::NotInGroup(actor)),
        }
        if g.role_of(new_leader).is_none() {
            return Err(GroupOpError::NotInGroup(new_leader));
        }

        for m in &mut g.members {
            m.role = match (m.character == new_leader, m.role) {
                (true, _) => GroupRole::Leader,
                (false, GroupRole::Leader) => GroupRole::Member,
                (false, role) => role,
            };
        }
        Ok(())
    }

    async fn set_assistant(
        &self,
        group: GroupId,
        actor: CharacterId,
        member: CharacterId,
        assistant: bool,
    ) -> Result<(), GroupOpError> {
        let mut groups = self.groups.write().expect("lock poisoned");
        let g = groups.get_mut(&group).ok_or(GroupOpError::NotFound(group))?;

        match g.role_of(actor) {
            Some(GroupRole::Leader) => {}
            Some(_) => return Err(GroupOpError::PermissionDenied(actor)),
            None => return Err(GroupOpError::NotInGroup(actor)),
        }

        let m = g
            .members
            .iter_mut()
            .find(|m| m.character == member)
            .ok_or(GroupOpError::NotInGroup(member))?;
        if m.role != GroupRole::Leader {
            m.role = if assistant {
                GroupRole::Assistant
            } else {
                GroupRole::Member
            };
        }
        Ok(())
    }

    async fn set_loot_method(
        &self,
        group: GroupId,
        actor: CharacterId,
        method: LootMethod,
        master: Option<CharacterId>,
    ) -> Result<(), GroupOpError> {
        let mut groups = self.groups.write().expect("lock poisoned");
        let g = groups.get_mut(&group).ok_or(GroupOpError::NotFound(group))?;

        match g.role_of(actor) {
            Some(GroupRole::Leader) => {}
            Some(_) => return Err(GroupOpError::PermissionDenied(actor)),
            None => return Err(GroupOpError::NotInGroup(actor)),
        }

        g.loot_method = method;
        g.loot_master = master;
        Ok(())
    }

    async fn disband(&self, group: GroupId, actor: CharacterId) -> Result<(), GroupOpError> {
        let mut groups = self.groups.write().expect("lock poisoned");
        let g = groups.get(&group).ok_or(GroupOpError::NotFound(group))?;
        match g.role_of(actor) {
            Some(GroupRole::Leader) => {}
            Some(_) => return Err(GroupOpError::PermissionDenied(actor)),
            None => return Err(GroupOpError::NotInGroup(actor)),
        }
        groups.remove(&group);
        self.bindings
            .write()
            .expect("lock poisoned")
            .retain(|(g, _), _| *g != group);
        Ok(())
    }

    async fn add_instance_binding(
        &self,
        group: GroupId,
        map: u32,
        instance: u32,
    ) -> Result<(), GroupOpError> {
        if !self.groups.read().expect("lock poisoned").contains_key(&group) {
            return Err(GroupOpError::NotFound(group));
        }
        self.bindings
            .write()
            .expect("lock poisoned")
            .insert((group, map), instance);
        Ok(())
    }

    async fn instance_binding(
        &self,
        group: GroupId,
        map: u32,
    ) -> Result<Option<u32>, GroupOpError> {
        Ok(self
            .bindings
            .read()
            .expect("lock poisoned")
            .get(&(group, map))
            .copied())
    }
}

/// An in-memory friend/ignore list, keyed by the owning character.
#[derive(Debug, Default)]
pub struct InMemorySocialService {
    lists: RwLock<HashMap<CharacterId, Vec<SocialEntry>>>,
}

impl InMemorySocialService {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entry(
        &self,
        character: CharacterId,
        target: CharacterId,
        apply: impl FnOnce(&mut SocialEntry),
    ) -> Result<(), SocialOpError> {
        let mut lists = self.lists.write().expect("lock poisoned");
        let entries = lists.entry(character).or_default();
        if let Some(entry) = entries.iter_mut().find(|e| e.target == target) {
            apply(entry);
        } else {
            if entries.len() >= MAX_SOCIAL_ENTRIES {
                return Err(SocialOpError::ListFull(character));
            }
            let mut entry = SocialEntry {
                target,
                flags: BitFlags::empty(),
                note: String::new(),
            };
            apply(&mut entry);
            entries.push(entry);
        }
        entries.retain(|e| !e.flags.is_empty());
        Ok(())
    }
}

/// The cap the original imposes on a single character's combined
/// friend/ignore list.
const MAX_SOCIAL_ENTRIES: usize = 50;

#[async_trait]
impl SocialService for InMemorySocialService {
    async fn list(&self, character: CharacterId) -> Result<Vec<SocialEntry>, SocialOpError> {
        Ok(self
            .lists
            .read()
            .expect("lock poisoned")
            .get(&character)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_friend(
        &self,
        character: CharacterId,
        friend: CharacterId,
        note: &str,
    ) -> Result<(), SocialOpError> {
        self.with_entry(character, friend, |e| {
            e.flags |= SocialFlag::Friend;
            e.note = note.to_string();
        })
    }

    async fn remove_friend(
        &self,
        character: CharacterId,
        friend: CharacterId,
    ) -> Result<(), SocialOpError> {
        self.with_entry(character, friend, |e| {
            e.flags.remove(SocialFlag::Friend);
            e.note.clear();
        })
    }

    async fn add_ignore(
        &self,
        character: CharacterId,
        ignored: CharacterId,
    ) -> Result<(), SocialOpError> {
        self.with_entry(character, ignored, |e| e.flags |= SocialFlag::Ignored)
    }

    async fn remove_ignore(
        &self,
        character: CharacterId,
        ignored: CharacterId,
    ) -> Result<(), SocialOpError> {
        self.with_entry(character, ignored, |e| e.flags.remove(SocialFlag::Ignored))
    }

    async fn friends_of(
        &self,
        character: CharacterId,
    ) -> Result<Vec<CharacterId>, SocialOpError> {
        Ok(self
            .lists
            .read()
            .expect("lock poisoned")
            .iter()
            .filter(|(_, entries)| {
                entries
                    .iter()
                    .any(|e| e.target == character && e.is_friend())
            })
            .map(|(owner, _)| *owner)
            .collect())
    }

    async fn can_whisper(
        &self,
        sender: CharacterId,
        recipient: CharacterId,
    ) -> Result<bool, SocialOpError> {
        let lists = self.lists.read().expect("lock poisoned");
        let blocked = lists
            .get(&recipient)
            .map(|entries| {
                entries
                    .iter()
                    .any(|e| e.target == sender && e.is_ignored())
            })
            .unwrap_or(false);
        Ok(!blocked)
    }

    async fn remove_everywhere(&self, character: CharacterId) -> Result<(), SocialOpError> {
        let mut lists = self.lists.write().expect("lock poisoned");
        for entries in lists.values_mut() {
            entries.retain(|e| e.target != character);
        }
        lists.remove(&character);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[async_std::test]
    async fn only_leader_or_assistant_may_invite() {
        let service = InMemoryGroupService::new();
        let leader = CharacterId(1);
        let outsider = CharacterId(2);
        let invitee = CharacterId(3);

        let group = service.create_group(leader).await.unwrap();
        let err = service.invite(group, outsider, invitee).await.unwrap_err();
        assert!(matches!(err, GroupOpError::NotInGroup(_)));

        service.invite(group, leader, invitee).await.unwrap();
        let g = service.get(group).await.unwrap();
        assert_eq!(g.role_of(invitee), Some(GroupRole::Member));
    }

    #[async_std::test]
    async fn member_may_leave_voluntarily_but_not_kick_others() {
        let service = InMemoryGroupService::new();
        let leader = CharacterId(1);
        let member = CharacterId(2);
        let other = CharacterId(3);

        let group = service.create_group(leader).await.unwrap();
        service.invite(group, leader, member).await.unwrap();
        service.invite(group, leader, other).await.unwrap();

        let err = service.kick(group, member, other).await.unwrap_err();
        assert!(matches!(err, GroupOpError::PermissionDenied(_)));

        service.kick(group, member, member).await.unwrap();
        let g = service.get(group).await.unwrap();
        assert!(g.role_of(member).is_none());
    }

    #[async_std::test]
    async fn assistant_may_kick_members_but_not_the_leader() {
        let service = InMemoryGroupService::new();
        let leader = CharacterId(1);
        let assistant = CharacterId(2);
        let member = CharacterId(3);

        let group = service.create_group(leader).await.unwrap();
        service.invite(group, leader, assistant).await.unwrap();
        service.invite(group, leader, member).await.unwrap();
        service
            .set_assistant(group, leader, assistant, true)
            .await
            .unwrap();

        let err = service.kick(group, assistant, leader).await.unwrap_err();
        assert!(matches!(err, GroupOpError::PermissionDenied(_)));

        service.kick(group, assistant, member).await.unwrap();
        let g = service.get(group).await.unwrap();
        assert!(g.role_of(member).is_none());
    }

    #[async_std::test]
    async fn loot_method_changes_require_the_leader() {
        let service = InMemoryGroupService::new();
        let leader = CharacterId(1);
        let assistant = CharacterId(2);

        let group = service.create_group(leader).await.unwrap();
        service.invite(group, leader, assistant).await.unwrap();
        service
            .set_assistant(group, leader, assistant, true)
            .await
            .unwrap();

        let err = service
            .set_loot_method(group, assistant, LootMethod::MasterLooter, Some(leader))
            .await
            .unwrap_err();
        assert!(matches!(err, GroupOpError::PermissionDenied(_)));

        service
            .set_loot_method(group, leader, LootMethod::MasterLooter, Some(leader))
            .await
            .unwrap();
        let g = service.get(group).await.unwrap();
        assert_eq!(g.loot_method, LootMethod::MasterLooter);
    }

    #[async_std::test]
    async fn instance_bindings_pin_a_group_to_a_map_copy() {
        let service = InMemoryGroupService::new();
        let leader = CharacterId(1);
        let group = service.create_group(leader).await.unwrap();

        assert_eq!(service.instance_binding(group, 389).await.unwrap(), None);
        service.add_instance_binding(group, 389, 7).await.unwrap();
        assert_eq!(service.instance_binding(group, 389).await.unwrap(), Some(7));
        assert_eq!(service.instance_binding(group, 0).await.unwrap(), None);
    }

    #[async_std::test]
    async fn ignored_sender_cannot_whisper() {
        let service = InMemorySocialService::new();
        let me = CharacterId(1);
        let annoying = CharacterId(2);

        assert!(service.can_whisper(annoying, me).await.unwrap());
        service.add_ignore(me, annoying).await.unwrap();
        assert!(!service.can_whisper(annoying, me).await.unwrap());
    }

    #[async_std::test]
    async fn friends_of_reports_reverse_edges() {
        let service = InMemorySocialService::new();
        let alice = CharacterId(1);
        let bob = CharacterId(2);
        let carol = CharacterId(3);

        service.add_friend(alice, carol, "healer").await.unwrap();
        service.add_friend(bob, carol, "").await.unwrap();
        service.add_ignore(carol, alice).await.unwrap();

        let mut friends = service.friends_of(carol).await.unwrap();
        friends.sort_by_key(|c| c.0);
        assert_eq!(friends, vec![alice, bob]);
        assert!(service.friends_of(alice).await.unwrap().is_empty());
    }

    #[async_std::test]
    async fn deleting_a_character_scrubs_every_list() {
        let service = InMemorySocialService::new();
        let alice = CharacterId(1);
        let bob = CharacterId(2);

        service.add_friend(alice, bob, "").await.unwrap();
        service.remove_everywhere(bob).await.unwrap();
        assert!(service.list(alice).await.unwrap().is_empty());
        assert!(service.friends_of(bob).await.unwrap().is_empty());
    }
}
