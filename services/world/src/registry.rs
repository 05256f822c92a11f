//! registry
//!
//! The realm's directory of in-world sessions. Each session task owns its
//! socket; everything else (the world-node router, other sessions
//! delivering whispers, broadcasts) reaches it through the channels
//! registered here. A character appears in the registry from the moment
//! its `PlayerLogin` is accepted until its connection is torn down.

use std::collections::HashMap;

use aegis_game::{
    accounts::AccountId,
    characters::{CharacterId, CharacterSnapshot},
};
use aegis_protocol::{
    realm::{ServerPacket, WhoEntry, WhoRequest},
    world::{WorldInstanceError, WorldLeftReason},
};
use async_std::{channel::Sender, sync::RwLock};
use tracing::debug;

use crate::nodes::NodeId;

/// Mail handed to a session by the world-node router; the session assigns
/// the mailbox id.
#[derive(Debug, Clone)]
pub struct MailDelivery {
    pub sender: CharacterId,
    pub subject: String,
    pub body: String,
    pub money: u32,
}

/// What the world side can tell a session about its character.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    WorldEntered {
        node: NodeId,
        instance: u32,
        map: u32,
        zone: u32,
        position: (f32, f32, f32),
        orientation: f32,
    },
    WorldLeft {
        reason: WorldLeftReason,
    },
    WorldError {
        error: WorldInstanceError,
    },
    TeleportRequested {
        map: u32,
        position: (f32, f32, f32),
        orientation: f32,
    },
    CharacterData(CharacterSnapshot),
    GroupMemberStats {
        level: u8,
        health: u32,
        max_health: u32,
        power_type: u8,
        power: u32,
        max_power: u32,
        map: u32,
        zone: u32,
        position: (f32, f32, f32),
    },
    MailReceived(MailDelivery),
    MailListRequested,
    MailRead {
        mail_id: u32,
    },
    /// The node hosting this character dropped its uplink.
    NodeLost,
}

/// The fields a `Who` answer needs, frozen at registration and refreshed
/// on zone changes.
#[derive(Debug, Clone)]
pub struct WhoCard {
    pub name: String,
    pub guild: String,
    pub level: u8,
    pub class: u8,
    pub race: u8,
    pub zone: u32,
}

/// How the rest of the process reaches one session task.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub account: AccountId,
    pub character: CharacterId,
    pub node: NodeId,
    pub card: WhoCard,
    pub packets: Sender<ServerPacket>,
    pub events: Sender<SessionEvent>,
}

/// A group invitation waiting on the invitee's answer. The group isn't
/// touched until they accept.
#[derive(Debug, Clone)]
pub struct PendingInvite {
    pub group: aegis_game::groups::GroupId,
    pub inviter: CharacterId,
    pub inviter_name: String,
}

/// All in-world sessions, keyed by character id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_character: RwLock<HashMap<CharacterId, ClientHandle>>,
    invites: RwLock<HashMap<CharacterId, PendingInvite>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, handle: ClientHandle) {
        let mut sessions = self.by_character.write().await;
        debug!(account = %handle.account, character = %handle.character, "session registered");
        if sessions.insert(handle.character, handle).is_some() {
            debug!("character handle replaced by a newer session");
        }
    }

    pub async fn unregister(&self, character: CharacterId) {
        self.by_character.write().await.remove(&character);
        self.invites.write().await.remove(&character);
    }

    /// Parks a group invitation on the invitee until they answer. Only
    /// one invitation is held at a time; a newer one wins.
    pub async fn set_invite(&self, invitee: CharacterId, invite: PendingInvite) {
        self.invites.write().await.insert(invitee, invite);
    }

    /// Consumes the invitee's pending invitation, if any.
    pub async fn take_invite(&self, invitee: CharacterId) -> Option<PendingInvite> {
        self.invites.write().await.remove(&invitee)
    }

    pub async fn get(&self, character: CharacterId) -> Option<ClientHandle> {
        self.by_character.read().await.get(&character).cloned()
    }

    pub async fn find_by_name(&self, name: &str) -> Option<ClientHandle> {
        self.by_character
            .read()
            .await
            .values()
            .find(|h| h.card.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub async fn is_online(&self, character: CharacterId) -> bool {
        self.by_character.read().await.contains_key(&character)
    }

    /// Queues a packet for one session; `false` if it isn't online.
    pub async fn send_packet(&self, character: CharacterId, packet: ServerPacket) -> bool {
        match self.get(character).await {
            Some(handle) => handle.packets.send(packet).await.is_ok(),
            None => false,
        }
    }

    /// Queues a world event for one session; `false` if it isn't online.
    pub async fn send_event(&self, character: CharacterId, event: SessionEvent) -> bool {
        match self.get(character).await {
            Some(handle) => handle.events.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Queues a packet for every online session except `except`.
    pub async fn broadcast(&self, packet: &ServerPacket, except: Option<CharacterId>) {
        let handles: Vec<ClientHandle> =
            self.by_character.read().await.values().cloned().collect();
        for handle in handles {
            if Some(handle.character) == except {
                continue;
            }
            handle.packets.send(packet.clone()).await.ok();
        }
    }

    /// Notifies every session bound to `node` that its world vanished.
    /// Returns how many were notified.
    pub async fn notify_node_lost(&self, node: NodeId) -> usize {
        let handles: Vec<ClientHandle> = self
            .by_character
            .read()
            .await
            .values()
            .filter(|h| h.node == node)
            .cloned()
            .collect();
        let count = handles.len();
        for handle in handles {
            handle.events.send(SessionEvent::NodeLost).await.ok();
        }
        count
    }

    /// Re-points a session at another node after a transfer commit.
    pub async fn rebind_node(&self, character: CharacterId, node: NodeId) {
        if let Some(handle) = self.by_character.write().await.get_mut(&character) {
            handle.node = node;
        }
    }

    pub async fn update_zone(&self, character: CharacterId, zone: u32) {
        if let Some(handle) = self.by_character.write().await.get_mut(&character) {
            handle.card.zone = zone;
        }
    }

    pub async fn count(&self) -> usize {
        self.by_character.read().await.len()
    }

    /// Evaluates a `Who` filter against every online session.
    pub async fn who_matches(&self, request: &WhoRequest, limit: usize) -> Vec<WhoEntry> {
        let sessions = self.by_character.read().await;
        sessions
            .values()
            .filter(|h| {
                let card = &h.card;
                let level = u32::from(card.level);
                if request.min_level > 0 && level < request.min_level {
                    return false;
                }
                if request.max_level > 0 && level > request.max_level {
                    return false;
                }
                if request.race_mask != 0 && request.race_mask & (1 << card.race) == 0 {
                    return false;
                }
                if request.class_mask != 0 && request.class_mask & (1 << card.class) == 0 {
                    return false;
                }
                if !request.zones.is_empty() && !request.zones.contains(&card.zone) {
                    return false;
                }
                if !request.player_name.is_empty()
                    && !card
                        .name
                        .to_ascii_lowercase()
                        .contains(&request.player_name.to_ascii_lowercase())
                {
                    return false;
                }
                if !request.strings.is_empty() {
                    let haystack =
                        format!("{} {}", card.name, card.guild).to_ascii_lowercase();
                    if !request
                        .strings
                        .iter()
                        .any(|s| haystack.contains(&s.to_ascii_lowercase()))
                    {
                        return false;
                    }
                }
                true
            })
            .take(limit)
            .map(|h| WhoEntry {
                name: h.card.name.clone(),
                guild: h.card.guild.clone(),
                level: u32::from(h.card.level),
                class: u32::from(h.card.class),
                race: u32::from(h.card.race),
                zone: h.card.zone,
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_std::channel::unbounded;

    fn handle(
        character: u32,
        name: &str,
        level: u8,
        zone: u32,
    ) -> (ClientHandle, async_std::channel::Receiver<ServerPacket>) {
        let (packets, packet_rx) = unbounded();
        let (events, _event_rx) = unbounded();
        (
            ClientHandle {
                account: AccountId(character),
                character: CharacterId(character),
                node: 1,
                card: WhoCard {
                    name: name.to_string(),
                    guild: String::new(),
                    level,
                    class: 1,
                    race: 1,
                    zone,
                },
                packets,
                events,
            },
            packet_rx,
        )
    }

    #[async_std::test]
    async fn broadcast_skips_the_sender() {
        let registry = SessionRegistry::new();
        let (alice, alice_rx) = handle(1, "Alice", 10, 12);
        let (bob, bob_rx) = handle(2, "Bob", 20, 12);
        registry.register(alice).await;
        registry.register(bob).await;

        registry
            .broadcast(&ServerPacket::GroupDestroyed, Some(CharacterId(1)))
            .await;

        assert!(bob_rx.try_recv().is_ok());
        assert!(alice_rx.try_recv().is_err());
    }

    #[async_std::test]
    async fn who_filters_by_level_and_zone() {
        let registry = SessionRegistry::new();
        let (alice, _a) = handle(1, "Alice", 10, 12);
        let (bob, _b) = handle(2, "Bob", 60, 14);
        registry.register(alice).await;
        registry.register(bob).await;

        let request = WhoRequest {
            min_level: 50,
            max_level: 70,
            ..WhoRequest::default()
        };
        let matches = registry.who_matches(&request, 49).await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "Bob");

        let request = WhoRequest {
            zones: vec![12],
            ..WhoRequest::default()
        };
        let matches = registry.who_matches(&request, 49).await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "Alice");
    }

    #[async_std::test]
    async fn delivery_to_a_departed_session_is_a_no_op() {
        let registry = SessionRegistry::new();
        let (alice, rx) = handle(1, "Alice", 10, 12);
        registry.register(alice).await;
        registry.unregister(CharacterId(1)).await;

        // a late world frame for a closed session goes nowhere, quietly
        assert!(
            !registry
                .send_packet(CharacterId(1), ServerPacket::GroupDestroyed)
                .await
        );
        assert!(
            !registry
                .send_event(CharacterId(1), SessionEvent::NodeLost)
                .await
        );
        assert!(rx.try_recv().is_err());
    }

    #[async_std::test]
    async fn name_lookup_ignores_case() {
        let registry = SessionRegistry::new();
        let (alice, _rx) = handle(1, "Alice", 10, 12);
        registry.register(alice).await;
        assert!(registry.find_by_name("ALICE").await.is_some());
        assert!(registry.find_by_name("nobody").await.is_none());
    }
}
