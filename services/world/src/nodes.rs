//! nodes
//!
//! The realm's side of the realm↔world uplink. World nodes dial in on
//! startup and declare which maps they can host; the realm claims each
//! map for exactly one node and from then on routes character placements
//! and proxied frames by map or by live instance. A node that goes quiet
//! past the keep-alive window, or drops its socket, takes every character
//! it hosted down with it.

use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use aegis_game::characters::CharacterService;
use aegis_protocol::{
    world::{NodeLoginResult, RealmToWorld, WorldToRealm, WORLD_PROTOCOL_VERSION},
    wow_bincode,
};
use anyhow::{anyhow, Result};
use async_std::{
    channel::{unbounded, Receiver, Sender},
    future::timeout,
    io::{ReadExt, WriteExt},
    net::{TcpListener, TcpStream},
    prelude::*,
    sync::RwLock,
    task,
};
use bincode::Options;
use tracing::{debug, info, instrument, trace, warn};

use crate::registry::{MailDelivery, SessionEvent, SessionRegistry};

/// Identifies one connected world node for the lifetime of its uplink.
pub type NodeId = u32;

/// A node with no frame for this long is presumed dead.
const KEEP_ALIVE_WINDOW: Duration = Duration::from_secs(30);

struct Node {
    address: String,
    maps: Vec<u32>,
    instances: HashSet<u32>,
    sender: Sender<RealmToWorld>,
}

/// The set of connected world nodes, indexed for lookup by map and by
/// live instance.
pub struct WorldNodes {
    realm_name: String,
    sessions: Arc<SessionRegistry>,
    characters: Arc<dyn CharacterService + Send + Sync>,
    next_id: AtomicU32,
    nodes: RwLock<HashMap<NodeId, Node>>,
}

impl std::fmt::Debug for WorldNodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldNodes").finish_non_exhaustive()
    }
}

impl WorldNodes {
    pub fn new(
        realm_name: String,
        sessions: Arc<SessionRegistry>,
        characters: Arc<dyn CharacterService + Send + Sync>,
    ) -> Self {
        Self {
            realm_name,
            sessions,
            characters,
            next_id: AtomicU32::new(1),
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// The node hosting `map`, if any. First registration wins a map.
    pub async fn node_for_map(&self, map: u32) -> Option<(NodeId, Sender<RealmToWorld>)> {
        self.nodes
            .read()
            .await
            .iter()
            .find(|(_, node)| node.maps.contains(&map))
            .map(|(id, node)| (*id, node.sender.clone()))
    }

    /// The node running `instance`, if any.
    pub async fn node_for_instance(
        &self,
        instance: u32,
    ) -> Option<(NodeId, Sender<RealmToWorld>)> {
        self.nodes
            .read()
            .await
            .iter()
            .find(|(_, node)| node.instances.contains(&instance))
            .map(|(id, node)| (*id, node.sender.clone()))
    }

    pub async fn sender(&self, id: NodeId) -> Option<Sender<RealmToWorld>> {
        self.nodes.read().await.get(&id).map(|n| n.sender.clone())
    }

    /// Queues a message to a node; `false` if the node is gone.
    pub async fn send(&self, id: NodeId, message: RealmToWorld) -> bool {
        match self.sender(id).await {
            Some(sender) => sender.send(message).await.is_ok(),
            None => false,
        }
    }

    /// The maps out of `offered` that no connected node hosts yet.
    async fn claimable_maps(&self, offered: &[u32]) -> Vec<u32> {
        let nodes = self.nodes.read().await;
        offered
            .iter()
            .copied()
            .filter(|map| !nodes.values().any(|n| n.maps.contains(map)))
            .collect()
    }

    async fn register(&self, node: Node) -> NodeId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.nodes.write().await.insert(id, node);
        id
    }

    async fn remove(&self, id: NodeId) {
        if let Some(node) = self.nodes.write().await.remove(&id) {
            info!(node = id, address = %node.address, "world node removed");
        }
    }

    async fn add_instance(&self, id: NodeId, instance: u32) {
        if let Some(node) = self.nodes.write().await.get_mut(&id) {
            node.instances.insert(instance);
        }
    }

    pub async fn count(&self) -> usize {
        self.nodes.read().await.len()
    }
}

/// Listens for world-node connections.
#[instrument(skip(nodes))]
pub async fn listen(bind: SocketAddr, nodes: Arc<WorldNodes>) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(%bind, "listening for world nodes");

    let mut incoming = listener.incoming();
    while let Some(stream) = incoming.next().await {
        let stream = stream?;
        let nodes = nodes.clone();
        task::spawn(async move {
            if let Err(e) = handle_node(stream, &nodes).await {
                warn!("world node connection ended: {e}");
            }
        });
    }

    Ok(())
}

async fn handle_node(mut stream: TcpStream, nodes: &WorldNodes) -> Result<()> {
    let address = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".into());

    // the first frame has to be the node's login
    let (maps, instances) =
        match timeout(KEEP_ALIVE_WINDOW, read_frame::<WorldToRealm>(&mut stream)).await {
            Ok(Ok(Some(WorldToRealm::Login { protocol_version, maps, instances }))) => {
                if protocol_version != WORLD_PROTOCOL_VERSION {
                    write_frame(
                        &mut stream,
                        &RealmToWorld::LoginAnswer {
                            result: NodeLoginResult::UnsupportedVersion,
                            realm_name: nodes.realm_name.clone(),
                        },
                    )
                    .await?;
                    return Ok(());
                }
                (maps, instances)
            }
            Ok(Ok(None)) | Err(_) => return Ok(()),
            Ok(Ok(Some(_))) => {
                return Err(anyhow!("world node at {address} skipped its login"))
            }
            Ok(Err(e)) => return Err(e),
        };

    let claimed = nodes.claimable_maps(&maps).await;
    if claimed.is_empty() {
        warn!(%address, "world node offers no map this realm still needs");
        write_frame(
            &mut stream,
            &RealmToWorld::LoginAnswer {
                result: NodeLoginResult::MapsAlreadyInUse,
                realm_name: nodes.realm_name.clone(),
            },
        )
        .await?;
        return Ok(());
    }

    let (sender, outbox) = unbounded();
    let id = nodes
        .register(Node {
            address: address.clone(),
            maps: claimed.clone(),
            instances: instances.into_iter().collect(),
            sender: sender.clone(),
        })
        .await;
    info!(node = id, %address, ?claimed, "world node registered");

    sender
        .send(RealmToWorld::LoginAnswer {
            result: NodeLoginResult::Success,
            realm_name: nodes.realm_name.clone(),
        })
        .await
        .ok();

    let writer = task::spawn(write_outbox(stream.clone(), outbox));

    let outcome = route_frames(&mut stream, id, nodes).await;

    // tearing the node down tears its characters down with it
    nodes.remove(id).await;
    sender.close();
    writer.await.ok();
    let dropped = nodes.sessions.notify_node_lost(id).await;
    if dropped > 0 {
        warn!(node = id, dropped, "world node lost with characters in flight");
    }

    outcome
}

async fn write_outbox(mut stream: TcpStream, outbox: Receiver<RealmToWorld>) -> Result<()> {
    while let Ok(message) = outbox.recv().await {
        write_frame(&mut stream, &message).await?;
    }
    Ok(())
}

async fn route_frames(stream: &mut TcpStream, id: NodeId, nodes: &WorldNodes) -> Result<()> {
    loop {
        let message =
            match timeout(KEEP_ALIVE_WINDOW, read_frame::<WorldToRealm>(stream)).await {
                Ok(Ok(Some(m))) => m,
                Ok(Ok(None)) => return Ok(()),
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!(node = id, "world node idle past the keep-alive window");
                    return Ok(());
                }
            };

        dispatch(message, id, nodes).await;
    }
}

async fn dispatch(message: WorldToRealm, id: NodeId, nodes: &WorldNodes) {
    let sessions = &nodes.sessions;
    match message {
        WorldToRealm::Login { .. } => {
            warn!(node = id, "world node sent a second login, ignoring");
        }
        WorldToRealm::KeepAlive => {}

        WorldToRealm::InstanceEntered {
            character,
            instance,
            world_object,
            map,
            zone,
            position,
            orientation,
        } => {
            nodes.add_instance(id, instance).await;
            sessions.update_zone(character, zone).await;
            let delivered = sessions
                .send_event(
                    character,
                    SessionEvent::WorldEntered {
                        node: id,
                        instance,
                        map,
                        zone,
                        position,
                        orientation,
                    },
                )
                .await;
            if !delivered {
                warn!(%character, "world entry for a character with no session");
            }
            trace!(%character, world_object, instance, "instance entered");
        }
        WorldToRealm::InstanceLeft { character, reason } => {
            if !sessions
                .send_event(character, SessionEvent::WorldLeft { reason })
                .await
            {
                debug!(%character, ?reason, "world left for a character with no session");
            }
        }
        WorldToRealm::InstanceError { character, error } => {
            sessions
                .send_event(character, SessionEvent::WorldError { error })
                .await;
        }

        WorldToRealm::Proxy(packet) => {
            if packet.opcode == 0 {
                warn!(node = id, "world node proxied opcode zero, dropping");
                return;
            }
            let delivered = sessions
                .send_packet(
                    packet.character,
                    aegis_protocol::realm::ServerPacket::Proxy {
                        opcode: packet.opcode,
                        body: packet.body,
                    },
                )
                .await;
            if !delivered {
                debug!(character = %packet.character, "dropping proxy packet for an offline character");
            }
        }

        WorldToRealm::CharacterData(snapshot) => {
            let character = snapshot.id;
            let delivered = sessions
                .send_event(character, SessionEvent::CharacterData(snapshot.clone()))
                .await;
            if !delivered {
                // the player is already gone: this is the final state the
                // teardown path was waiting on, persist it directly
                if let Err(e) = nodes.characters.persist_snapshot(&snapshot).await {
                    warn!(%character, "failed to persist final character state: {e}");
                }
            }
        }

        WorldToRealm::TeleportRequest { character, map, position, orientation } => {
            sessions
                .send_event(
                    character,
                    SessionEvent::TeleportRequested { map, position, orientation },
                )
                .await;
        }

        WorldToRealm::GroupUpdate {
            character,
            nearby: _,
            level,
            health,
            max_health,
            power_type,
            power,
            max_power,
            map,
            zone,
            position,
        } => {
            sessions.update_zone(character, zone).await;
            sessions
                .send_event(
                    character,
                    SessionEvent::GroupMemberStats {
                        level,
                        health,
                        max_health,
                        power_type,
                        power,
                        max_power,
                        map,
                        zone,
                        position,
                    },
                )
                .await;
        }

        WorldToRealm::QuestUpdate { character, quest, status, .. } => {
            // quest state is owned by the world simulation; nothing on the
            // realm consumes it
            trace!(%character, quest, status, "quest update");
        }
        WorldToRealm::CharacterSpawned { character } => {
            trace!(%character, "character spawned");
        }

        WorldToRealm::MailDraft { sender, receiver_name, subject, body, money, cost } => {
            route_mail(nodes, id, sender, receiver_name, subject, body, money, cost).await;
        }
        WorldToRealm::MailGetList { character } => {
            sessions
                .send_event(character, SessionEvent::MailListRequested)
                .await;
        }
        WorldToRealm::MailMarkAsRead { character, mail_id } => {
            sessions
                .send_event(character, SessionEvent::MailRead { mail_id })
                .await;
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn route_mail(
    nodes: &WorldNodes,
    node: NodeId,
    sender: aegis_game::characters::CharacterId,
    receiver_name: String,
    subject: String,
    body: String,
    money: u32,
    cost: u32,
) {
    let sessions = &nodes.sessions;
    let recipient = match sessions.find_by_name(&receiver_name).await {
        Some(r) => r,
        None => {
            debug!(%sender, receiver_name, "mail to an offline or unknown recipient");
            return;
        }
    };
    if recipient.character == sender {
        return;
    }

    // postage and attached money leave the sender on its own node
    nodes
        .send(
            node,
            RealmToWorld::MoneyChange {
                character: sender,
                amount: cost + money,
                remove: true,
            },
        )
        .await;

    recipient
        .events
        .send(SessionEvent::MailReceived(MailDelivery {
            sender,
            subject,
            body,
            money,
        }))
        .await
        .ok();
}

async fn read_frame<T: serde::de::DeserializeOwned>(
    stream: &mut TcpStream,
) -> Result<Option<T>> {
    let mut len_buf = [0u8; 4];
    if stream.read(&mut len_buf[..1]).await? == 0 {
        return Ok(None);
    }
    stream.read_exact(&mut len_buf[1..]).await?;
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(Some(
        wow_bincode()
            .deserialize(&buf)
            .map_err(|e| anyhow!("malformed world uplink frame: {e}"))?,
    ))
}

async fn write_frame<T: serde::Serialize>(stream: &mut TcpStream, value: &T) -> Result<()> {
    let body = wow_bincode().serialize(value)?;
    stream.write_all(&(body.len() as u32).to_le_bytes()).await?;
    stream.write_all(&body).await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use aegis_game::{
        accounts::AccountId,
        characters::{
            ActionButton, Character, CharacterId, CharacterOpError, CharacterSnapshot,
            NewCharacter, StarterKit,
        },
    };

    use super::*;

    // a CharacterService stub; the claim logic never touches it
    struct NoCharacters;

    #[async_trait::async_trait]
    impl CharacterService for NoCharacters {
        async fn get(&self, id: CharacterId) -> Result<Character, CharacterOpError> {
            Err(CharacterOpError::NotFound(id))
        }
        async fn get_by_name(&self, _: &str) -> Result<Character, CharacterOpError> {
            Err(CharacterOpError::NotFound(CharacterId(0)))
        }
        async fn get_by_account(
            &self,
            _: AccountId,
        ) -> Result<Vec<Character>, CharacterOpError> {
            Ok(Vec::new())
        }
        async fn count_by_account(&self, _: AccountId) -> Result<usize, CharacterOpError> {
            Ok(0)
        }
        async fn name_available(&self, _: &str) -> Result<bool, CharacterOpError> {
            Ok(true)
        }
        async fn create_character(
            &self,
            _: AccountId,
            _: NewCharacter,
            _: StarterKit,
        ) -> Result<CharacterId, CharacterOpError> {
            Err(CharacterOpError::PersistError("stub".into()))
        }
        async fn delete_character(&self, id: CharacterId) -> Result<(), CharacterOpError> {
            Err(CharacterOpError::NotFound(id))
        }
        async fn rename_character(
            &self,
            id: CharacterId,
            _: &str,
        ) -> Result<(), CharacterOpError> {
            Err(CharacterOpError::NotFound(id))
        }
        async fn persist_snapshot(
            &self,
            _: &CharacterSnapshot,
        ) -> Result<(), CharacterOpError> {
            Ok(())
        }
        async fn action_buttons(
            &self,
            _: CharacterId,
        ) -> Result<Vec<ActionButton>, CharacterOpError> {
            Ok(Vec::new())
        }
        async fn set_action_buttons(
            &self,
            _: CharacterId,
            _: &[ActionButton],
        ) -> Result<(), CharacterOpError> {
            Ok(())
        }
        async fn spells(&self, _: CharacterId) -> Result<Vec<u32>, CharacterOpError> {
            Ok(Vec::new())
        }
        async fn learn_spell(&self, _: CharacterId, _: u32) -> Result<(), CharacterOpError> {
            Ok(())
        }
        async fn inventory(
            &self,
            _: CharacterId,
        ) -> Result<Vec<aegis_game::characters::InventorySlot>, CharacterOpError> {
            Ok(Vec::new())
        }
    }

    fn nodes() -> WorldNodes {
        WorldNodes::new(
            "Test Realm".into(),
            Arc::new(SessionRegistry::new()),
            Arc::new(NoCharacters),
        )
    }

    #[async_std::test]
    async fn first_node_claims_a_map_and_later_nodes_do_not() {
        let registry = nodes();

        let (sender_a, _rx_a) = unbounded();
        registry
            .register(Node {
                address: "a".into(),
                maps: vec![0, 1],
                instances: HashSet::new(),
                sender: sender_a,
            })
            .await;

        assert_eq!(registry.claimable_maps(&[0, 1, 530]).await, vec![530]);
        assert!(registry.node_for_map(0).await.is_some());
        assert!(registry.node_for_map(530).await.is_none());
    }

    #[async_std::test]
    async fn instance_lookup_follows_registration() {
        let registry = nodes();
        let (sender, _rx) = unbounded();
        let id = registry
            .register(Node {
                address: "a".into(),
                maps: vec![389],
                instances: HashSet::new(),
                sender,
            })
            .await;

        assert!(registry.node_for_instance(7).await.is_none());
        registry.add_instance(id, 7).await;
        let (found, _) = registry.node_for_instance(7).await.unwrap();
        assert_eq!(found, id);
    }
}
