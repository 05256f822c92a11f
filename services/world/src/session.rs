//! session
//!
//! Drives one realm client connection: the session-key handshake
//! (`AuthChallenge`/`CMSG_AUTH_SESSION` against the login service), the
//! character screen, and the hand-off into [`crate::proxy`] once a
//! character is placed on a world node. After the handshake the socket
//! splits into a reader task and a writer task; the session logic in
//! between is a single consumer of [`SessionInput`]s, so world events and
//! client frames can never race each other.

use std::{sync::Arc, time::Duration};

use aegis_game::{
    accounts::AccountId,
    characters::{ActionButton, CharacterId, CharacterService, CharacterSnapshot},
    groups::GroupService,
    guid::Guid,
    realms::RealmId,
    social::SocialService,
};
use aegis_header_crypto::{HeaderCrypto, SendHeaderCipher};
use aegis_protocol::{
    opcodes::{Expansion, RealmCommand, ResponseCode},
    realm::{
        AuthSession, CharEnumEntry, ClientPacket, EquipSlot, ServerPacket,
        CHAR_ENUM_EQUIPMENT_SLOTS,
    },
    world::{ItemStack, RealmToWorld},
    wow_bincode,
};
use anyhow::Result;
use async_std::{
    channel::{unbounded, Receiver, Sender},
    future::timeout,
    net::TcpStream,
    task,
};
use bincode::Options;
use rand::Rng;
use sha1::{Digest, Sha1};
use tracing::{debug, info, instrument, warn};

use aegis_utils::{PacketParseResult, RateWindow};

use crate::{
    char_create::{self, CreateRefusal},
    login_uplink::LoginUplink,
    nodes::{NodeId, WorldNodes},
    protocol::{decode_client_packet, write_frame, FrameReader},
    proxy::{self, AfterWorld, TransferStage},
    registry::{ClientHandle, MailDelivery, SessionEvent, SessionRegistry, WhoCard},
    state_machine::{admits, gate, SessionStatus},
};

/// The one client build this realm speaks.
pub const SUPPORTED_BUILD: u32 = 8606;

/// Character slots per account on one realm.
pub const MAX_CHARACTERS_PER_ACCOUNT: usize = 11;

/// Everything a session needs beyond its own socket.
#[derive(Clone)]
pub struct SessionServices {
    pub characters: Arc<dyn CharacterService + Send + Sync>,
    pub groups: Arc<dyn GroupService + Send + Sync>,
    pub social: Arc<dyn SocialService + Send + Sync>,
    pub login_uplink: Arc<LoginUplink>,
    pub sessions: Arc<SessionRegistry>,
    pub nodes: Arc<WorldNodes>,
    pub realm_id: RealmId,
    pub realm_name: String,
    pub motd: Vec<String>,
    pub player_capacity: u32,
    pub idle_timeout: Duration,
    pub transfer_timeout: Duration,
}

impl std::fmt::Debug for SessionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionServices")
            .field("realm_id", &self.realm_id)
            .finish_non_exhaustive()
    }
}

/// Everything that can wake the session logic up.
#[derive(Debug)]
pub enum SessionInput {
    /// A raw frame off the client socket.
    Frame { opcode: u16, body: Vec<u8> },
    /// Something the world side reported about this session's character.
    World(SessionEvent),
    /// The client socket closed, errored or idled out.
    ClientGone,
}

/// One mail held on the realm for a character.
#[derive(Debug, Clone)]
pub struct MailEntry {
    pub id: u32,
    pub delivery: MailDelivery,
    pub read: bool,
}

/// The realm-side state of a character placed (or being placed) on a
/// world node.
pub struct InWorld {
    pub character: CharacterId,
    pub guid: Guid,
    pub node: NodeId,
    pub node_tx: Sender<RealmToWorld>,
    pub instance: Option<u32>,
    pub shadow: CharacterSnapshot,
    pub action_buttons: Vec<ActionButton>,
    pub buttons_dirty: bool,
    pub first_entry_done: bool,
    pub transfer: TransferStage,
    pub mails: Vec<MailEntry>,
    pub next_mail_id: u32,
    pub unread_mail: u32,
    pub who_window: RateWindow,
    pub time_sync: u32,
    pub logging_out: bool,
}

pub struct Session {
    pub services: SessionServices,
    pub account: AccountId,
    pub username: String,
    pub tutorial: [u32; 8],
    pub tutorial_dirty: bool,
    pub out: Sender<ServerPacket>,
    pub inputs: Receiver<SessionInput>,
    pub events_tx: Sender<SessionEvent>,
}

enum AfterCharSelect {
    Closed,
    World(Box<InWorld>),
}

pub(crate) enum CharSelectOutcome {
    Stay,
    Close,
    Enter(Box<InWorld>),
}

#[instrument(skip(stream, services))]
pub async fn handle_connection(mut stream: TcpStream, services: SessionServices) -> Result<()> {
    let mut reader = FrameReader::new();
    let mut no_cipher: Option<SendHeaderCipher> = None;

    let server_seed: u32 = rand::thread_rng().gen();
    write_frame(
        &mut stream,
        &mut no_cipher,
        RealmCommand::AuthChallenge.into(),
        &wow_bincode().serialize(&server_seed)?,
    )
    .await?;

    let (auth, reply) = match authenticate(&mut stream, &mut reader, &services, server_seed).await?
    {
        Some(v) => v,
        None => return Ok(()),
    };

    let (send_cipher, recv_cipher) = HeaderCrypto::new(&reply.session_key).into_split();
    reader.install_cipher(recv_cipher);

    let (out, out_rx) = unbounded();
    let writer = task::spawn(write_client(stream.clone(), send_cipher, out_rx));

    out.send(ServerPacket::AuthResponse {
        code: ResponseCode::Success,
        expansion: Expansion::BurningCrusade,
    })
    .await?;
    out.send(ServerPacket::AddonInfo(auth.addons.clone())).await?;
    out.send(ServerPacket::ClientCacheVersion(0)).await?;
    out.send(ServerPacket::TutorialData(reply.tutorial)).await?;

    let (inputs_tx, inputs) = unbounded();
    let (events_tx, events_rx) = unbounded();
    task::spawn(forward_events(events_rx, inputs_tx.clone()));
    task::spawn(read_client(
        reader,
        stream.clone(),
        inputs_tx,
        services.idle_timeout,
    ));

    info!(account = %reply.account, username = %reply.username, "realm session authenticated");

    let mut session = Session {
        services,
        account: reply.account,
        username: reply.username,
        tutorial: reply.tutorial,
        tutorial_dirty: false,
        out,
        inputs,
        events_tx,
    };

    let outcome = session.run().await;
    info!(account = %session.account, username = %session.username, "realm session ended");

    // the login service owns the durable copies of what this session
    // accumulated
    if session.tutorial_dirty {
        session
            .services
            .login_uplink
            .tutorial_data(session.account, session.tutorial)
            .await
            .ok();
    }
    session
        .services
        .login_uplink
        .player_logout(session.account)
        .await
        .ok();

    session.out.close();
    writer.await;
    stream.shutdown(std::net::Shutdown::Both).ok();
    outcome
}

/// Runs the handshake: exactly one `AuthSession`, proven against the
/// session key the login service negotiated.
async fn authenticate(
    stream: &mut TcpStream,
    reader: &mut FrameReader,
    services: &SessionServices,
    server_seed: u32,
) -> Result<Option<(AuthSession, crate::login_uplink::PlayerLoginReply)>> {
    let mut no_cipher: Option<SendHeaderCipher> = None;

    loop {
        let (opcode, body) =
            match timeout(services.idle_timeout, reader.next_frame(stream)).await {
                Ok(Ok(frame)) => frame,
                Ok(Err(e)) => {
                    debug!("connection ended before auth: {e}");
                    return Ok(None);
                }
                Err(_) => {
                    warn!("idle timeout before auth session");
                    return Ok(None);
                }
            };

        let packet = match decode_client_packet(opcode, &body) {
            Ok(p) => p,
            Err(e) => {
                // not logged in yet: log and drop, keep the socket
                warn!("dropping unknown pre-auth packet: {e}");
                continue;
            }
        };

        if !admits(SessionStatus::Connected, &packet) {
            warn!("protocol violation: unexpected packet before auth session");
            return Ok(None);
        }

        match packet {
            ClientPacket::AuthSession(auth) => {
                if auth.build != SUPPORTED_BUILD {
                    warn!(build = auth.build, "unsupported client build");
                    return Ok(None);
                }

                let reply = match services.login_uplink.player_login(&auth.username).await {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(username = %auth.username, "no live session at login service: {e}");
                        return Ok(None);
                    }
                };

                if !verify_session_proof(
                    &auth.username,
                    &auth.local_challenge,
                    server_seed,
                    &reply.session_key,
                    &auth.client_proof,
                ) {
                    // the client never completed SRP with the login
                    // service for this key
                    warn!(username = %auth.username, "auth session proof mismatch");
                    return Ok(None);
                }

                return Ok(Some((auth, reply)));
            }
            ClientPacket::Ping { seq, .. } => {
                let (opcode, body) =
                    crate::protocol::encode_server_packet(&ServerPacket::Pong(seq))?;
                write_frame(stream, &mut no_cipher, opcode, &body).await?;
            }
            ClientPacket::KeepAlive => {}
            _ => unreachable!("admits() only lets AuthSession/KeepAlive/Ping through here"),
        }
    }
}

/// `digest = SHA1(username || u32(0) || client_seed || server_seed || session_key)`,
/// matching the proof the client computes over the same fields.
fn verify_session_proof(
    username: &str,
    local_challenge: &[u8; 4],
    server_seed: u32,
    session_key: &[u8; 40],
    client_proof: &[u8; 20],
) -> bool {
    let mut hasher = Sha1::new();
    hasher.update(username.as_bytes());
    hasher.update(0u32.to_le_bytes());
    hasher.update(local_challenge);
    hasher.update(server_seed.to_le_bytes());
    hasher.update(session_key);
    let digest: [u8; 20] = hasher.finalize().into();
    digest == *client_proof
}

async fn write_client(
    mut stream: TcpStream,
    cipher: SendHeaderCipher,
    out: Receiver<ServerPacket>,
) {
    let mut cipher = Some(cipher);
    while let Ok(packet) = out.recv().await {
        if let Err(e) = crate::protocol::write_packet(&mut stream, &mut cipher, &packet).await {
            debug!("writer task ended: {e}");
            return;
        }
    }
}

async fn read_client(
    mut reader: FrameReader,
    mut stream: TcpStream,
    inputs: Sender<SessionInput>,
    idle: Duration,
) {
    loop {
        match timeout(idle, reader.next_frame(&mut stream)).await {
            Ok(Ok((opcode, body))) => {
                if inputs
                    .send(SessionInput::Frame { opcode, body })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Ok(Err(e)) => {
                debug!("client read ended: {e}");
                inputs.send(SessionInput::ClientGone).await.ok();
                return;
            }
            Err(_) => {
                warn!("client idle past the session window");
                inputs.send(SessionInput::ClientGone).await.ok();
                return;
            }
        }
    }
}

async fn forward_events(events: Receiver<SessionEvent>, inputs: Sender<SessionInput>) {
    while let Ok(event) = events.recv().await {
        if inputs.send(SessionInput::World(event)).await.is_err() {
            return;
        }
    }
}

impl Session {
    async fn run(&mut self) -> Result<()> {
        loop {
            match self.char_select().await? {
                AfterCharSelect::Closed => return Ok(()),
                AfterCharSelect::World(world) => {
                    match proxy::in_world(self, *world).await? {
                        AfterWorld::CharSelect => continue,
                        AfterWorld::Closed => return Ok(()),
                    }
                }
            }
        }
    }

    async fn char_select(&mut self) -> Result<AfterCharSelect> {
        loop {
            let input = match self.inputs.recv().await {
                Ok(i) => i,
                Err(_) => return Ok(AfterCharSelect::Closed),
            };

            let (opcode, body) = match input {
                SessionInput::ClientGone => return Ok(AfterCharSelect::Closed),
                // a late event from a world this session already left
                SessionInput::World(event) => {
                    debug!(?event, "dropping world event at the character screen");
                    continue;
                }
                SessionInput::Frame { opcode, body } => (opcode, body),
            };

            let packet = match decode_client_packet(opcode, &body) {
                Ok(p) => p,
                Err(e) => {
                    warn!(account = %self.account, "dropping unknown packet at char select: {e}");
                    continue;
                }
            };

            match gate(SessionStatus::Authenticated, &packet) {
                PacketParseResult::Pass => {}
                PacketParseResult::Block => {
                    warn!(account = %self.account, "packet not admitted at char select, dropping");
                    continue;
                }
                PacketParseResult::Disconnect => {
                    warn!(account = %self.account, "second auth session, closing");
                    return Ok(AfterCharSelect::Closed);
                }
            }

            match self.dispatch_char_select(packet).await? {
                CharSelectOutcome::Stay => {}
                CharSelectOutcome::Close => return Ok(AfterCharSelect::Closed),
                CharSelectOutcome::Enter(world) => return Ok(AfterCharSelect::World(world)),
            }
        }
    }

    async fn dispatch_char_select(&mut self, packet: ClientPacket) -> Result<CharSelectOutcome> {
        match packet {
            ClientPacket::KeepAlive => {}
            ClientPacket::Ping { seq, .. } => {
                self.out.send(ServerPacket::Pong(seq)).await?;
            }
            ClientPacket::ReadyForAccountDataTimes => {
                self.out
                    .send(ServerPacket::AccountDataTimes([0u32; 32]))
                    .await?;
            }
            ClientPacket::RealmSplit { realm } => {
                self.out.send(ServerPacket::RealmSplit { realm }).await?;
            }

            ClientPacket::CharEnum => self.send_char_enum().await?,
            ClientPacket::CharCreate(request) => self.create_character(request).await?,
            ClientPacket::CharDelete(id) => self.delete_character(id).await?,
            ClientPacket::CharRename { character, name } => {
                self.rename_character(character, name).await?
            }

            ClientPacket::PlayerLogin(character) => {
                return self.enter_world(character).await;
            }
            ClientPacket::LogoutRequest => return Ok(CharSelectOutcome::Close),

            other => {
                debug!(?other, "char-select packet with no handler, dropping");
            }
        }
        Ok(CharSelectOutcome::Stay)
    }

    async fn send_char_enum(&mut self) -> Result<()> {
        let characters = self
            .services
            .characters
            .get_by_account(self.account)
            .await?;
        let entries = characters
            .into_iter()
            .map(|character| CharEnumEntry {
                guid: Guid::player(character.id, self.services.realm_id),
                first_login: character.level <= 1 && character.zone == 0,
                guild: 0,
                equipment: [EquipSlot::default(); CHAR_ENUM_EQUIPMENT_SLOTS],
                character,
            })
            .collect();
        self.out.send(ServerPacket::CharEnum(entries)).await?;
        Ok(())
    }

    async fn create_character(
        &mut self,
        request: aegis_game::characters::NewCharacter,
    ) -> Result<()> {
        use aegis_game::characters::CharacterOpError;

        let code = match char_create::validate(&request) {
            Err(CreateRefusal::BadName) => ResponseCode::CharCreateError,
            Err(CreateRefusal::BadCombo) => ResponseCode::CharCreateInvalidRaceClass,
            Ok(()) => {
                // the table was just consulted, the kit exists
                let kit = char_create::starter_kit(request.race, request.class)
                    .expect("validated combo has a kit");
                match self
                    .services
                    .characters
                    .create_character(self.account, request, kit)
                    .await
                {
                    Ok(id) => {
                        info!(account = %self.account, character = %id, "character created");
                        ResponseCode::Success
                    }
                    Err(CharacterOpError::NameTaken) => ResponseCode::NameInUse,
                    Err(CharacterOpError::TooManyCharacters) => {
                        ResponseCode::CharCreateServerLimit
                    }
                    Err(e) => {
                        warn!(account = %self.account, "character creation failed: {e}");
                        ResponseCode::CharCreateError
                    }
                }
            }
        };

        self.out.send(ServerPacket::CharCreate(code)).await?;
        Ok(())
    }

    async fn delete_character(&mut self, id: CharacterId) -> Result<()> {
        use aegis_game::characters::CharacterOpError;

        if !self.owns_character(id).await {
            self.out
                .send(ServerPacket::CharDelete(ResponseCode::CharDeleteFailed))
                .await?;
            return Ok(());
        }

        let guid = Guid::player(id, self.services.realm_id);
        let code = match self.services.characters.delete_character(id).await {
            Ok(()) => {
                // anyone who had them as a contact sees them drop off
                if let Ok(friends) = self.services.social.friends_of(id).await {
                    for friend in friends {
                        self.services
                            .sessions
                            .send_packet(
                                friend,
                                ServerPacket::FriendStatus {
                                    guid: guid.0,
                                    online: false,
                                },
                            )
                            .await;
                    }
                }
                self.services.social.remove_everywhere(id).await.ok();
                info!(account = %self.account, character = %id, "character deleted");
                ResponseCode::Success
            }
            Err(CharacterOpError::NotFound(_)) => ResponseCode::CharDeleteFailed,
            Err(e) => {
                warn!(account = %self.account, "character deletion failed: {e}");
                ResponseCode::CharDeleteFailed
            }
        };

        self.out.send(ServerPacket::CharDelete(code)).await?;
        Ok(())
    }

    async fn rename_character(&mut self, id: CharacterId, name: String) -> Result<()> {
        use aegis_game::characters::CharacterOpError;

        let character = match self.services.characters.get(id).await {
            Ok(c) if c.account == self.account => c,
            _ => {
                self.out
                    .send(ServerPacket::CharRename {
                        character: id,
                        name,
                        result: ResponseCode::Failure,
                    })
                    .await?;
                return Ok(());
            }
        };

        // renames are only open while the flag forces one
        if !character.at_login_rename {
            self.out
                .send(ServerPacket::CharRename {
                    character: id,
                    name,
                    result: ResponseCode::Failure,
                })
                .await?;
            return Ok(());
        }

        let result = if !char_create::valid_name(&name) {
            ResponseCode::CharCreateError
        } else {
            match self.services.characters.rename_character(id, &name).await {
                Ok(()) => ResponseCode::Success,
                Err(CharacterOpError::NameTaken) => ResponseCode::NameInUse,
                Err(e) => {
                    warn!(account = %self.account, "rename failed: {e}");
                    ResponseCode::Failure
                }
            }
        };

        if result == ResponseCode::Success {
            // other clients drop the old name from their caches;
            // realm-local, world nodes are not involved
            let guid = Guid::player(id, self.services.realm_id);
            self.services
                .sessions
                .broadcast(
                    &ServerPacket::NameQueryResponse {
                        guid: guid.0,
                        name: name.clone(),
                        realm: String::new(),
                        race: u32::from(character.race),
                        gender: u32::from(character.gender),
                        class: u32::from(character.class),
                    },
                    None,
                )
                .await;
            info!(account = %self.account, character = %id, "character renamed");
        }

        self.out
            .send(ServerPacket::CharRename {
                character: id,
                name,
                result,
            })
            .await?;
        Ok(())
    }

    async fn enter_world(&mut self, id: CharacterId) -> Result<CharSelectOutcome> {
        let character = match self.services.characters.get(id).await {
            Ok(c) if c.account == self.account => c,
            _ => {
                self.out
                    .send(ServerPacket::CharLoginFailed(
                        ResponseCode::CharLoginNoCharacter,
                    ))
                    .await?;
                return Ok(CharSelectOutcome::Stay);
            }
        };

        if character.at_login_rename {
            self.out
                .send(ServerPacket::CharLoginFailed(
                    ResponseCode::CharLoginRenamePending,
                ))
                .await?;
            return Ok(CharSelectOutcome::Stay);
        }

        let (node, node_tx) = match self.services.nodes.node_for_map(character.map).await {
            Some(n) => n,
            None => {
                warn!(character = %id, map = character.map, "no world node for map");
                self.out
                    .send(ServerPacket::CharLoginFailed(ResponseCode::CharLoginNoWorld))
                    .await?;
                return Ok(CharSelectOutcome::Stay);
            }
        };

        let spells = self.services.characters.spells(id).await.unwrap_or_default();
        let action_buttons = self
            .services
            .characters
            .action_buttons(id)
            .await
            .unwrap_or_default();
        let money = character.money;
        let snapshot = CharacterSnapshot::from_character(&character, spells, money);
        let guid = Guid::player(id, self.services.realm_id);

        // a persistent group keeps its members in the same dungeon copy
        let instance = match self.services.groups.group_of(id).await {
            Ok(Some(group)) => self
                .services
                .groups
                .instance_binding(group.id, character.map)
                .await
                .unwrap_or(None),
            _ => None,
        };

        self.services
            .sessions
            .register(ClientHandle {
                account: self.account,
                character: id,
                node,
                card: WhoCard {
                    name: character.name.clone(),
                    guild: String::new(),
                    level: character.level,
                    class: character.class,
                    race: character.race,
                    zone: character.zone,
                },
                packets: self.out.clone(),
                events: self.events_tx.clone(),
            })
            .await;

        info!(account = %self.account, character = %id, map = character.map, "placing character");

        // placement always precedes any proxied frame for this character
        if node_tx
            .send(RealmToWorld::CharacterLogIn {
                character: guid.0,
                instance,
                snapshot: snapshot.clone(),
            })
            .await
            .is_err()
        {
            self.services.sessions.unregister(id).await;
            self.out
                .send(ServerPacket::CharLoginFailed(ResponseCode::CharLoginNoWorld))
                .await?;
            return Ok(CharSelectOutcome::Stay);
        }

        // the node simulates the inventory; hand it the stored contents
        if let Ok(items) = self.services.characters.inventory(id).await {
            node_tx
                .send(RealmToWorld::ItemData {
                    character: id,
                    items: items
                        .into_iter()
                        .map(|i| ItemStack {
                            item: i.item,
                            count: i.count,
                            slot: i.slot,
                        })
                        .collect(),
                })
                .await
                .ok();
        }

        self.services
            .login_uplink
            .update_current_players(
                self.services.sessions.count().await as u32,
                self.services.player_capacity,
            )
            .await
            .ok();

        Ok(CharSelectOutcome::Enter(Box::new(InWorld {
            character: id,
            guid,
            node,
            node_tx,
            instance: None,
            shadow: snapshot,
            action_buttons,
            buttons_dirty: false,
            first_entry_done: false,
            transfer: TransferStage::AwaitingEntry {
                deadline: std::time::Instant::now() + self.services.transfer_timeout,
            },
            mails: Vec::new(),
            next_mail_id: 1,
            unread_mail: 0,
            who_window: RateWindow::new(1, Duration::from_secs(6)),
            time_sync: 0,
            logging_out: false,
        })))
    }

    async fn owns_character(&self, id: CharacterId) -> bool {
        matches!(
            self.services.characters.get(id).await,
            Ok(c) if c.account == self.account
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn matching_proof_verifies() {
        let session_key = [7u8; 40];
        let local_challenge = [1, 2, 3, 4];
        let server_seed = 0xAABB_CCDD;

        let mut hasher = Sha1::new();
        hasher.update(b"PLAYER");
        hasher.update(0u32.to_le_bytes());
        hasher.update(local_challenge);
        hasher.update(server_seed.to_le_bytes());
        hasher.update(session_key);
        let proof: [u8; 20] = hasher.finalize().into();

        assert!(verify_session_proof("PLAYER", &local_challenge, server_seed, &session_key, &proof));
    }

    #[test]
    fn wrong_session_key_is_rejected() {
        let local_challenge = [1, 2, 3, 4];
        let server_seed = 42;

        let mut hasher = Sha1::new();
        hasher.update(b"PLAYER");
        hasher.update(0u32.to_le_bytes());
        hasher.update(local_challenge);
        hasher.update(server_seed.to_le_bytes());
        hasher.update([1u8; 40]);
        let proof: [u8; 20] = hasher.finalize().into();

        assert!(!verify_session_proof("PLAYER", &local_challenge, server_seed, &[2u8; 40], &proof));
    }

    #[test]
    fn proof_binds_the_server_seed() {
        let session_key = [7u8; 40];
        let local_challenge = [1, 2, 3, 4];

        let mut hasher = Sha1::new();
        hasher.update(b"PLAYER");
        hasher.update(0u32.to_le_bytes());
        hasher.update(local_challenge);
        hasher.update(5u32.to_le_bytes());
        hasher.update(session_key);
        let proof: [u8; 20] = hasher.finalize().into();

        assert!(verify_session_proof("PLAYER", &local_challenge, 5, &session_key, &proof));
        assert!(!verify_session_proof("PLAYER", &local_challenge, 6, &session_key, &proof));
    }
}
