//! proxy
//!
//! The in-world phase of a realm session. Once a character is placed on
//! a world node the realm stops simulating anything: opcodes it knows
//! (chat, who, social, groups, tutorials, logout, the transfer ack) are
//! handled here, and every other client frame is forwarded opaquely to
//! the bound world node as a proxy packet, byte-identical in body. World
//! frames addressed to this character flow back through the session's
//! event channel and are re-framed with the connection's header cipher.

use std::time::Instant;

use aegis_game::guid::Guid;
use aegis_protocol::{
    opcodes::{RealmCommand, ResponseCode},
    realm::{
        ChatMessageRequest, ChatType, ClientPacket, MailListEntry, PartyOperation, PartyResult,
        ServerPacket, SocialListEntry, WhoRequest,
    },
    world::{ClientProxyPacket, RealmToWorld, WorldLeftReason},
    wow_bincode,
};
use aegis_utils::PacketParseResult;
use anyhow::Result;
use async_std::future::timeout;
use bincode::Options;
use tracing::{debug, info, trace, warn};

use crate::{
    char_create,
    chat::WhisperTarget,
    protocol::decode_client_packet,
    registry::{PendingInvite, SessionEvent},
    session::{InWorld, MailEntry, Session, SessionInput},
    state_machine::{gate, SessionStatus},
};

/// Where the connection goes after the world phase ends.
pub enum AfterWorld {
    /// Back to the character screen, connection intact.
    CharSelect,
    /// The connection is done.
    Closed,
}

/// Where a map hand-off currently stands.
#[derive(Debug, Clone, Copy)]
pub enum TransferStage {
    None,
    /// `TransferPending` sent; waiting for the current node to let go.
    LeavingWorld {
        map: u32,
        position: (f32, f32, f32),
        orientation: f32,
    },
    /// `NewWorld` sent; waiting for the client's port ack.
    AwaitingPortAck {
        map: u32,
        position: (f32, f32, f32),
        orientation: f32,
    },
    /// `CharacterLogIn` sent; waiting for the node to confirm entry.
    AwaitingEntry { deadline: Instant },
}

/// How long the realm waits for the world's final character state after
/// the client vanishes mid-world.
const FINAL_STATE_WINDOW: std::time::Duration = std::time::Duration::from_secs(10);

/// A who response never reports more rows than the client can show.
const WHO_RESPONSE_CAP: usize = 49;

fn effective_status(world: &InWorld) -> SessionStatus {
    match world.transfer {
        TransferStage::None => SessionStatus::LoggedIn,
        _ => SessionStatus::TransferPending,
    }
}

enum NextInput {
    Input(SessionInput),
    TransferTimedOut,
    Gone,
}

async fn next_input(session: &Session, world: &InWorld) -> NextInput {
    if let TransferStage::AwaitingEntry { deadline } = world.transfer {
        let now = Instant::now();
        if deadline <= now {
            return NextInput::TransferTimedOut;
        }
        return match timeout(deadline - now, session.inputs.recv()).await {
            Ok(Ok(input)) => NextInput::Input(input),
            Ok(Err(_)) => NextInput::Gone,
            Err(_) => NextInput::TransferTimedOut,
        };
    }
    match session.inputs.recv().await {
        Ok(input) => NextInput::Input(input),
        Err(_) => NextInput::Gone,
    }
}

pub async fn in_world(session: &mut Session, mut world: InWorld) -> Result<AfterWorld> {
    loop {
        let input = match next_input(session, &world).await {
            NextInput::Input(i) => i,
            NextInput::TransferTimedOut => return transfer_timed_out(session, &mut world).await,
            NextInput::Gone => return client_lost(session, &mut world).await,
        };

        match input {
            SessionInput::ClientGone => return client_lost(session, &mut world).await,

            SessionInput::Frame { opcode, body } => {
                match decode_client_packet(opcode, &body) {
                    // anything the realm doesn't recognize belongs to the
                    // simulation; the body crosses untouched
                    Err(_) => {
                        world
                            .node_tx
                            .send(RealmToWorld::Proxy(ClientProxyPacket {
                                character: world.character,
                                opcode,
                                body,
                            }))
                            .await
                            .ok();
                    }
                    Ok(packet) => {
                        match gate(effective_status(&world), &packet) {
                            PacketParseResult::Pass => {}
                            PacketParseResult::Block => {
                                warn!(character = %world.character, "packet not admitted in this phase, dropping");
                                continue;
                            }
                            PacketParseResult::Disconnect => {
                                warn!(character = %world.character, "second auth session in world, closing");
                                leave_world(session, &mut world).await;
                                return Ok(AfterWorld::Closed);
                            }
                        }
                        if let Some(after) = dispatch_client(session, &mut world, packet).await? {
                            return Ok(after);
                        }
                    }
                }
            }

            SessionInput::World(event) => {
                if let Some(after) = handle_event(session, &mut world, event).await? {
                    return Ok(after);
                }
            }
        }
    }
}

async fn dispatch_client(
    session: &mut Session,
    world: &mut InWorld,
    packet: ClientPacket,
) -> Result<Option<AfterWorld>> {
    match packet {
        ClientPacket::KeepAlive => {}
        ClientPacket::Ping { seq, .. } => {
            session.out.send(ServerPacket::Pong(seq)).await?;
        }

        ClientPacket::LogoutRequest => {
            world.logging_out = true;
            session
                .out
                .send(ServerPacket::LogoutResponse { allowed: true })
                .await?;
            world
                .node_tx
                .send(RealmToWorld::LeaveInstance {
                    character: world.character,
                    reason: WorldLeftReason::Logout,
                })
                .await
                .ok();
        }

        ClientPacket::MoveWorldPortAck => {
            if let TransferStage::AwaitingPortAck { map, position, orientation } = world.transfer
            {
                return commit_transfer(session, world, map, position, orientation).await;
            }
            warn!(character = %world.character, "port ack with no transfer in flight");
        }

        ClientPacket::TimeSyncResponse { counter, ticks } => {
            trace!(character = %world.character, counter, ticks, "time sync answer");
        }

        ClientPacket::NameQuery(guid) => handle_name_query(session, world, guid).await?,
        ClientPacket::Who(request) => handle_who(session, world, request).await?,
        ClientPacket::MessageChat(message) => handle_chat(session, world, message).await?,

        ClientPacket::TutorialFlag(flag) => {
            let (word, bit) = (flag / 32, flag % 32);
            if let Some(slot) = session.tutorial.get_mut(word as usize) {
                *slot |= 1 << bit;
                session.tutorial_dirty = true;
            }
        }
        ClientPacket::TutorialClear => {
            session.tutorial = [u32::MAX; 8];
            session.tutorial_dirty = true;
        }
        ClientPacket::TutorialReset => {
            session.tutorial = [0; 8];
            session.tutorial_dirty = true;
        }

        ClientPacket::SetActionButton { button, action, kind } => {
            world.action_buttons.retain(|b| b.button != button);
            if action != 0 {
                world.action_buttons.push(aegis_game::characters::ActionButton {
                    button,
                    action,
                    kind,
                });
            }
            world.buttons_dirty = true;
        }

        ClientPacket::FriendList => send_social_list(session, world).await?,
        ClientPacket::AddFriend { name, note } => {
            add_friend(session, world, &name, &note).await?
        }
        ClientPacket::DelFriend(guid) => {
            if let Some(friend) = guid.character() {
                session
                    .services
                    .social
                    .remove_friend(world.character, friend)
                    .await
                    .ok();
                send_social_list(session, world).await?;
            }
        }
        ClientPacket::AddIgnore { name } => {
            if let Ok(target) = session.services.characters.get_by_name(&name).await {
                session
                    .services
                    .social
                    .add_ignore(world.character, target.id)
                    .await
                    .ok();
                send_social_list(session, world).await?;
                sync_ignore_list(session, world).await;
            }
        }
        ClientPacket::DelIgnore(guid) => {
            if let Some(ignored) = guid.character() {
                session
                    .services
                    .social
                    .remove_ignore(world.character, ignored)
                    .await
                    .ok();
                send_social_list(session, world).await?;
                sync_ignore_list(session, world).await;
            }
        }

        ClientPacket::GroupInvite { name } => group_invite(session, world, &name).await?,
        ClientPacket::GroupAccept => group_accept(session, world).await?,
        ClientPacket::GroupDecline => group_decline(session, world).await?,
        ClientPacket::GroupUninvite { name } => group_uninvite(session, world, &name).await?,
        ClientPacket::GroupSetLeader(guid) => group_set_leader(session, world, guid).await?,
        ClientPacket::GroupAssistant { target, assistant } => {
            if let (Ok(Some(group)), Some(member)) = (
                session.services.groups.group_of(world.character).await,
                target.character(),
            ) {
                session
                    .services
                    .groups
                    .set_assistant(group.id, world.character, member, assistant)
                    .await
                    .ok();
                broadcast_group_list(session, group.id).await;
            }
        }
        ClientPacket::LootMethod { method, master, threshold: _ } => {
            if let Ok(Some(group)) = session.services.groups.group_of(world.character).await {
                use aegis_game::groups::LootMethod;
                let method = match method {
                    0 => LootMethod::FreeForAll,
                    1 => LootMethod::RoundRobin,
                    2 => LootMethod::MasterLooter,
                    4 => LootMethod::NeedBeforeGreed,
                    _ => LootMethod::GroupLoot,
                };
                if session
                    .services
                    .groups
                    .set_loot_method(group.id, world.character, method, master.character())
                    .await
                    .is_err()
                {
                    session
                        .out
                        .send(ServerPacket::PartyCommandResult {
                            operation: PartyOperation::Swap,
                            member: String::new(),
                            result: PartyResult::NotLeader,
                        })
                        .await?;
                } else {
                    broadcast_group_list(session, group.id).await;
                }
            }
        }
        ClientPacket::GroupDisband => group_leave(session, world).await?,

        other => {
            debug!(?other, "in-world packet with no handler, dropping");
        }
    }
    Ok(None)
}

async fn handle_event(
    session: &mut Session,
    world: &mut InWorld,
    event: SessionEvent,
) -> Result<Option<AfterWorld>> {
    match event {
        SessionEvent::WorldEntered { node, instance, map, zone, position, orientation } => {
            // a transfer may have landed on a different node than the one
            // the placement went out to
            if node != world.node {
                if let Some(node_tx) = session.services.nodes.sender(node).await {
                    world.node = node;
                    world.node_tx = node_tx;
                }
            }
            world.instance = Some(instance);
            world.shadow.relocate(map, zone, position, orientation);
            session
                .services
                .sessions
                .update_zone(world.character, zone)
                .await;

            // keep the group inside this copy of the map from now on
            if let Ok(Some(group)) = session.services.groups.group_of(world.character).await {
                session
                    .services
                    .groups
                    .add_instance_binding(group.id, map, instance)
                    .await
                    .ok();
            }

            let first = !world.first_entry_done;
            world.transfer = TransferStage::None;
            send_entry_sequence(session, world, first).await?;
            world.first_entry_done = true;
            info!(character = %world.character, map, instance, "entered world instance");
        }

        SessionEvent::WorldLeft { reason } => match reason {
            WorldLeftReason::Logout => {
                if !world.logging_out {
                    warn!(character = %world.character, "world released the character without a logout request");
                }
                leave_world(session, world).await;
                session.out.send(ServerPacket::LogoutComplete).await?;
                info!(character = %world.character, "logged out to character screen");
                return Ok(Some(AfterWorld::CharSelect));
            }
            WorldLeftReason::Teleport => {
                if let TransferStage::LeavingWorld { map, position, orientation } = world.transfer
                {
                    session
                        .out
                        .send(ServerPacket::NewWorld {
                            map,
                            x: position.0,
                            y: position.1,
                            z: position.2,
                            orientation,
                        })
                        .await?;
                    world.transfer = TransferStage::AwaitingPortAck { map, position, orientation };
                } else {
                    warn!(character = %world.character, "world released the character with no transfer armed");
                }
            }
            WorldLeftReason::Disconnect => {
                warn!(character = %world.character, "world node dropped the character");
                leave_world(session, world).await;
                return Ok(Some(AfterWorld::Closed));
            }
        },

        SessionEvent::WorldError { error } => {
            warn!(character = %world.character, ?error, "world node refused the placement");
            let packet = if world.first_entry_done {
                ServerPacket::TransferAborted
            } else {
                ServerPacket::CharLoginFailed(ResponseCode::CharLoginNoWorld)
            };
            session.out.send(packet).await?;
            leave_world(session, world).await;
            return Ok(Some(AfterWorld::CharSelect));
        }

        SessionEvent::TeleportRequested { map, position, orientation } => {
            session.out.send(ServerPacket::TransferPending { map }).await?;
            world
                .node_tx
                .send(RealmToWorld::LeaveInstance {
                    character: world.character,
                    reason: WorldLeftReason::Teleport,
                })
                .await
                .ok();
            world.transfer = TransferStage::LeavingWorld { map, position, orientation };
            info!(character = %world.character, map, "transfer initiated");
        }

        SessionEvent::CharacterData(snapshot) => {
            session
                .services
                .sessions
                .update_zone(world.character, snapshot.zone)
                .await;

            // spells the simulation granted since the last sync
            for spell in &snapshot.spells {
                if !world.shadow.spells.contains(spell) {
                    session
                        .services
                        .characters
                        .learn_spell(world.character, *spell)
                        .await
                        .ok();
                }
            }

            world.shadow = snapshot;
            if let Err(e) = session
                .services
                .characters
                .persist_snapshot(&world.shadow)
                .await
            {
                warn!(character = %world.character, "state sync persist failed: {e}");
            }
        }

        SessionEvent::GroupMemberStats { level, map, zone, position, .. } => {
            world.shadow.level = level;
            world.shadow.relocate(map, zone, position, world.shadow.orientation);
            session
                .services
                .sessions
                .update_zone(world.character, zone)
                .await;
        }

        SessionEvent::MailReceived(delivery) => {
            let id = world.next_mail_id;
            world.next_mail_id += 1;
            world.mails.push(MailEntry { id, delivery, read: false });
            world.unread_mail += 1;
        }
        SessionEvent::MailListRequested => {
            trace!(character = %world.character, unread = world.unread_mail, "mail list requested");
            let entries = world
                .mails
                .iter()
                .map(|mail| MailListEntry {
                    id: mail.id,
                    sender: Guid::player(mail.delivery.sender, session.services.realm_id).0,
                    subject: mail.delivery.subject.clone(),
                    money: mail.delivery.money,
                    read: mail.read,
                })
                .collect();
            session.out.send(ServerPacket::MailListResult(entries)).await?;
        }
        SessionEvent::MailRead { mail_id } => {
            if let Some(mail) = world.mails.iter_mut().find(|m| m.id == mail_id) {
                if !mail.read {
                    mail.read = true;
                    world.unread_mail = world.unread_mail.saturating_sub(1);
                }
            }
        }

        SessionEvent::NodeLost => {
            warn!(character = %world.character, "world node lost while in world");
            leave_world(session, world).await;
            return Ok(Some(AfterWorld::Closed));
        }
    }
    Ok(None)
}

/// The bounded window for a node to confirm a placement ran out.
async fn transfer_timed_out(session: &mut Session, world: &mut InWorld) -> Result<AfterWorld> {
    warn!(character = %world.character, "world node never confirmed the placement");
    world
        .node_tx
        .send(RealmToWorld::LeaveInstance {
            character: world.character,
            reason: WorldLeftReason::Disconnect,
        })
        .await
        .ok();

    let packet = if world.first_entry_done {
        ServerPacket::TransferAborted
    } else {
        ServerPacket::CharLoginFailed(ResponseCode::CharLoginNoWorld)
    };
    session.out.send(packet).await?;
    leave_world(session, world).await;
    Ok(AfterWorld::CharSelect)
}

/// The client vanished mid-world. The realm keeps this side alive until
/// the world node hands back the character's final state, so nothing the
/// simulation did in the last moments is lost.
async fn client_lost(session: &mut Session, world: &mut InWorld) -> Result<AfterWorld> {
    info!(character = %world.character, instance = ?world.instance, "client lost while in world");
    world
        .node_tx
        .send(RealmToWorld::LeaveInstance {
            character: world.character,
            reason: WorldLeftReason::Disconnect,
        })
        .await
        .ok();

    let deadline = Instant::now() + FINAL_STATE_WINDOW;
    loop {
        let now = Instant::now();
        if now >= deadline {
            warn!(character = %world.character, "no final character state before the window closed");
            break;
        }
        match timeout(deadline - now, session.inputs.recv()).await {
            Ok(Ok(SessionInput::World(SessionEvent::CharacterData(snapshot)))) => {
                world.shadow = snapshot;
                break;
            }
            Ok(Ok(SessionInput::World(_))) | Ok(Ok(SessionInput::Frame { .. })) => continue,
            Ok(Ok(SessionInput::ClientGone)) => continue,
            Ok(Err(_)) | Err(_) => break,
        }
    }

    leave_world(session, world).await;
    Ok(AfterWorld::Closed)
}

/// Common teardown for every way of leaving the world: persist the
/// shadow, tell the character's contacts, release the registry slot.
async fn leave_world(session: &mut Session, world: &mut InWorld) {
    if let Err(e) = session
        .services
        .characters
        .persist_snapshot(&world.shadow)
        .await
    {
        warn!(character = %world.character, "final persist failed: {e}");
    }
    if world.buttons_dirty {
        session
            .services
            .characters
            .set_action_buttons(world.character, &world.action_buttons)
            .await
            .ok();
    }

    if let Ok(friends) = session.services.social.friends_of(world.character).await {
        for friend in friends {
            session
                .services
                .sessions
                .send_packet(
                    friend,
                    ServerPacket::FriendStatus {
                        guid: world.guid.0,
                        online: false,
                    },
                )
                .await;
        }
    }

    session.services.sessions.unregister(world.character).await;
    session
        .services
        .login_uplink
        .update_current_players(
            session.services.sessions.count().await as u32,
            session.services.player_capacity,
        )
        .await
        .ok();
}

async fn commit_transfer(
    session: &mut Session,
    world: &mut InWorld,
    map: u32,
    position: (f32, f32, f32),
    orientation: f32,
) -> Result<Option<AfterWorld>> {
    let (node, node_tx) = match session.services.nodes.node_for_map(map).await {
        Some(n) => n,
        None => {
            warn!(character = %world.character, map, "no world node for the transfer target");
            session.out.send(ServerPacket::TransferAborted).await?;
            leave_world(session, world).await;
            return Ok(Some(AfterWorld::CharSelect));
        }
    };

    world
        .shadow
        .relocate(map, world.shadow.zone, position, orientation);

    let instance = match session.services.groups.group_of(world.character).await {
        Ok(Some(group)) => session
            .services
            .groups
            .instance_binding(group.id, map)
            .await
            .unwrap_or(None),
        _ => None,
    };

    if node_tx
        .send(RealmToWorld::CharacterLogIn {
            character: world.guid.0,
            instance,
            snapshot: world.shadow.clone(),
        })
        .await
        .is_err()
    {
        session.out.send(ServerPacket::TransferAborted).await?;
        leave_world(session, world).await;
        return Ok(Some(AfterWorld::CharSelect));
    }

    session.services.sessions.rebind_node(world.character, node).await;
    world.node = node;
    world.node_tx = node_tx;
    world.instance = None;
    world.transfer = TransferStage::AwaitingEntry {
        deadline: Instant::now() + session.services.transfer_timeout,
    };
    Ok(None)
}

/// The opening packet run after a confirmed world entry. The `first`
/// variant carries the once-per-session frames (account data, MOTD,
/// action bars, cinematic); a transfer re-entry sends only the
/// per-placement ones.
async fn send_entry_sequence(session: &mut Session, world: &mut InWorld, first: bool) -> Result<()> {
    let shadow = &world.shadow;
    let out = &session.out;

    out.send(ServerPacket::SetDungeonDifficulty(0)).await?;
    out.send(ServerPacket::LoginVerifyWorld {
        map: shadow.map,
        x: shadow.position_x,
        y: shadow.position_y,
        z: shadow.position_z,
        orientation: shadow.orientation,
    })
    .await?;

    if first {
        out.send(ServerPacket::AccountDataTimes([0u32; 32])).await?;
        out.send(ServerPacket::FeatureSystemStatus).await?;
        out.send(ServerPacket::Motd(session.services.motd.clone())).await?;
    }

    out.send(ServerPacket::SetRestStart(0)).await?;
    out.send(ServerPacket::BindPointUpdate {
        position: shadow.home_position,
        map: shadow.home_map,
        zone: shadow.home_zone,
    })
    .await?;
    out.send(ServerPacket::InitialSpells(shadow.spells.clone())).await?;

    if first {
        out.send(ServerPacket::ActionButtons(world.action_buttons.clone()))
            .await?;
        out.send(ServerPacket::InitializeFactions).await?;
    }

    out.send(ServerPacket::InitWorldStates {
        map: shadow.map,
        zone: shadow.zone,
    })
    .await?;
    out.send(ServerPacket::LoginSetTimeSpeed {
        game_time: 0,
        speed: 0.016_666_668,
    })
    .await?;

    if first && shadow.level <= 1 {
        if let Some(cinematic) = char_create::intro_cinematic(shadow.race) {
            out.send(ServerPacket::TriggerCinematic(cinematic)).await?;
        }
    }

    send_social_list(session, world).await?;

    // contacts with this character on their list see it come online
    if let Ok(friends) = session.services.social.friends_of(world.character).await {
        for friend in friends {
            session
                .services
                .sessions
                .send_packet(
                    friend,
                    ServerPacket::FriendStatus {
                        guid: world.guid.0,
                        online: true,
                    },
                )
                .await;
        }
    }

    session
        .out
        .send(ServerPacket::CompressedSelfUpdate(build_self_update(
            world.guid,
            &world.shadow,
        )))
        .await?;

    world.time_sync += 1;
    session
        .out
        .send(ServerPacket::TimeSyncRequest(world.time_sync))
        .await?;

    Ok(())
}

/// A minimal create-self update block: one block, player object type,
/// no transport, position from the shadow. The world node owns the real
/// field state and replaces this with its own updates immediately.
fn build_self_update(guid: Guid, shadow: &aegis_game::characters::CharacterSnapshot) -> Vec<u8> {
    let mut block = wow_bincode()
        .serialize(&(
            1u32, // block count
            0u8,  // no out-of-range guids
            3u8,  // create-self
            0xFFu8,
            guid.0,
            4u8, // object type: player
        ))
        .expect("fixed-size tuple serializes");
    block.extend(
        wow_bincode()
            .serialize(&(
                0u32, // movement flags
                0u16,
                0u32, // timestamp
                shadow.position_x,
                shadow.position_y,
                shadow.position_z,
                shadow.orientation,
                0u32, // fall time
            ))
            .expect("fixed-size tuple serializes"),
    );
    // walk, run, run-back, swim, swim-back, fly, fly-back, turn
    for speed in [2.5f32, 7.0, 4.5, 4.722_222, 2.5, 7.0, 4.5, std::f32::consts::PI] {
        block.extend(speed.to_le_bytes());
    }
    // a one-word value mask carrying only the guid and level fields
    block.extend(
        wow_bincode()
            .serialize(&(1u8, 0b111u32, guid.0, u32::from(shadow.level)))
            .expect("fixed-size tuple serializes"),
    );
    block
}

async fn handle_name_query(session: &mut Session, world: &mut InWorld, guid: Guid) -> Result<()> {
    if guid.realm() != session.services.realm_id {
        // another realm's character: only the world side can resolve it
        let body = wow_bincode().serialize(&guid.0)?;
        world
            .node_tx
            .send(RealmToWorld::Proxy(ClientProxyPacket {
                character: world.character,
                opcode: RealmCommand::NameQuery.into(),
                body,
            }))
            .await
            .ok();
        return Ok(());
    }

    let id = match guid.character() {
        Some(id) => id,
        None => return Ok(()),
    };
    match session.services.characters.get(id).await {
        Ok(character) => {
            session
                .out
                .send(ServerPacket::NameQueryResponse {
                    guid: guid.0,
                    name: character.name,
                    realm: String::new(),
                    race: u32::from(character.race),
                    gender: u32::from(character.gender),
                    class: u32::from(character.class),
                })
                .await?;
        }
        Err(_) => {
            debug!(%id, "name query for an unknown character, dropping");
        }
    }
    Ok(())
}

async fn handle_who(session: &mut Session, world: &mut InWorld, request: WhoRequest) -> Result<()> {
    if !request.within_limits() {
        warn!(character = %world.character, "oversized who filter, dropping");
        return Ok(());
    }
    if !world.who_window.check(Instant::now()) {
        debug!(character = %world.character, "who request inside the cooldown, dropping");
        return Ok(());
    }

    let matches = session
        .services
        .sessions
        .who_matches(&request, WHO_RESPONSE_CAP)
        .await;
    session.out.send(ServerPacket::WhoResponse(matches)).await?;
    Ok(())
}

async fn handle_chat(
    session: &mut Session,
    world: &mut InWorld,
    message: ChatMessageRequest,
) -> Result<()> {
    match message.chat_type {
        // ranged and channel chat belong to the simulation
        ChatType::Say
        | ChatType::Yell
        | ChatType::Emote
        | ChatType::TextEmote
        | ChatType::Guild
        | ChatType::Officer
        | ChatType::Channel => {
            world
                .node_tx
                .send(RealmToWorld::ChatMessage {
                    character: world.guid.0,
                    chat_type: message.chat_type.into(),
                    language: message.language,
                    receiver: String::new(),
                    channel: message.channel.unwrap_or_default(),
                    message: message.message,
                })
                .await
                .ok();
        }

        ChatType::Whisper => {
            let raw = match message.recipient {
                Some(r) if !r.is_empty() => r,
                _ => return Ok(()),
            };
            whisper(session, world, &raw, message.language, message.message).await?;
        }

        ChatType::Party | ChatType::Raid | ChatType::RaidWarning => {
            let group = match session.services.groups.group_of(world.character).await {
                Ok(Some(g)) => g,
                _ => return Ok(()),
            };
            if message.chat_type == ChatType::RaidWarning {
                match group.role_of(world.character) {
                    Some(role) if role.can_manage() => {}
                    _ => {
                        debug!(character = %world.character, "raid warning without rank, dropping");
                        return Ok(());
                    }
                }
            }
            for member in &group.members {
                session
                    .services
                    .sessions
                    .send_packet(
                        member.character,
                        ServerPacket::ChatDelivered {
                            chat_type: message.chat_type,
                            language: message.language,
                            sender: world.guid.0,
                            message: message.message.clone(),
                        },
                    )
                    .await;
            }
        }

        ChatType::System | ChatType::WhisperInform => {
            debug!(character = %world.character, "client sent a server-only chat type, dropping");
        }
    }
    Ok(())
}

async fn whisper(
    session: &mut Session,
    world: &mut InWorld,
    raw_target: &str,
    language: u32,
    text: String,
) -> Result<()> {
    let target = WhisperTarget::parse(raw_target);

    if !target.is_local(&session.services.realm_name) {
        // another realm of the cluster: the world side carries it over
        world
            .node_tx
            .send(RealmToWorld::ChatMessage {
                character: world.guid.0,
                chat_type: ChatType::Whisper.into(),
                language,
                receiver: raw_target.to_string(),
                channel: String::new(),
                message: text,
            })
            .await
            .ok();
        return Ok(());
    }

    let recipient = match session.services.sessions.find_by_name(&target.name).await {
        Some(r) => r,
        None => {
            session
                .out
                .send(ServerPacket::ChatPlayerNotFound(target.name))
                .await?;
            return Ok(());
        }
    };

    // a blocked sender learns nothing, not even that they're blocked
    if let Ok(false) = session
        .services
        .social
        .can_whisper(world.character, recipient.character)
        .await
    {
        debug!(character = %world.character, "whisper to a blocking recipient, dropping");
        return Ok(());
    }

    if !char_create::same_faction(world.shadow.race, recipient.card.race) {
        session.out.send(ServerPacket::ChatWrongFaction).await?;
        return Ok(());
    }

    let recipient_guid = Guid::player(recipient.character, session.services.realm_id);
    recipient
        .packets
        .send(ServerPacket::ChatDelivered {
            chat_type: ChatType::Whisper,
            language,
            sender: world.guid.0,
            message: text.clone(),
        })
        .await
        .ok();
    session
        .out
        .send(ServerPacket::ChatDelivered {
            chat_type: ChatType::WhisperInform,
            language,
            sender: recipient_guid.0,
            message: text,
        })
        .await?;
    Ok(())
}

async fn send_social_list(session: &mut Session, world: &mut InWorld) -> Result<()> {
    let entries = match session.services.social.list(world.character).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(character = %world.character, "social list load failed: {e}");
            return Ok(());
        }
    };

    let mut wire = Vec::with_capacity(entries.len());
    for entry in entries {
        let online = session.services.sessions.is_online(entry.target).await;
        wire.push(SocialListEntry {
            guid: Guid::player(entry.target, session.services.realm_id).0,
            flags: entry.flags.bits(),
            note: entry.note,
            status: u8::from(online),
        });
    }
    session.out.send(ServerPacket::SocialList(wire)).await?;
    Ok(())
}

async fn add_friend(
    session: &mut Session,
    world: &mut InWorld,
    name: &str,
    note: &str,
) -> Result<()> {
    let target = match session.services.characters.get_by_name(name).await {
        Ok(c) => c,
        Err(_) => {
            session
                .out
                .send(ServerPacket::ChatPlayerNotFound(name.to_string()))
                .await?;
            return Ok(());
        }
    };
    if target.id == world.character
        || !char_create::same_faction(world.shadow.race, target.race)
    {
        return Ok(());
    }

    session
        .services
        .social
        .add_friend(world.character, target.id, note)
        .await
        .ok();
    send_social_list(session, world).await
}

/// Ships the current ignore set to the bound world node, which applies it
/// to emotes and other in-world interactions the realm never sees.
async fn sync_ignore_list(session: &mut Session, world: &mut InWorld) {
    let Ok(entries) = session.services.social.list(world.character).await else {
        return;
    };
    let ignored = entries
        .iter()
        .filter(|e| e.is_ignored())
        .map(|e| Guid::player(e.target, session.services.realm_id).0)
        .collect();
    world
        .node_tx
        .send(RealmToWorld::IgnoreList {
            character: world.character,
            ignored,
        })
        .await
        .ok();
}

/// The most members one group can hold (a full raid).
const MAX_GROUP_MEMBERS: usize = 40;

async fn group_invite(session: &mut Session, world: &mut InWorld, name: &str) -> Result<()> {
    let refuse = |result| ServerPacket::PartyCommandResult {
        operation: PartyOperation::Invite,
        member: name.to_string(),
        result,
    };

    let target = match session.services.sessions.find_by_name(name).await {
        Some(t) => t,
        None => {
            session.out.send(refuse(PartyResult::BadPlayerName)).await?;
            return Ok(());
        }
    };
    if !char_create::same_faction(world.shadow.race, target.card.race) {
        session.out.send(refuse(PartyResult::WrongFaction)).await?;
        return Ok(());
    }
    if let Ok(false) = session
        .services
        .social
        .can_whisper(world.character, target.character)
        .await
    {
        session.out.send(refuse(PartyResult::Ignored)).await?;
        return Ok(());
    }
    if let Ok(Some(_)) = session.services.groups.group_of(target.character).await {
        session.out.send(refuse(PartyResult::AlreadyInGroup)).await?;
        return Ok(());
    }

    let group = match session.services.groups.group_of(world.character).await {
        Ok(Some(group)) => {
            match group.role_of(world.character) {
                Some(role) if role.can_manage() => {}
                _ => {
                    session.out.send(refuse(PartyResult::NotLeader)).await?;
                    return Ok(());
                }
            }
            if group.members.len() >= MAX_GROUP_MEMBERS {
                session.out.send(refuse(PartyResult::GroupFull)).await?;
                return Ok(());
            }
            group.id
        }
        Ok(None) => match session.services.groups.create_group(world.character).await {
            Ok(id) => id,
            Err(e) => {
                warn!(character = %world.character, "group creation failed: {e}");
                session.out.send(refuse(PartyResult::NotInGroup)).await?;
                return Ok(());
            }
        },
        Err(e) => {
            warn!(character = %world.character, "group lookup failed: {e}");
            return Ok(());
        }
    };

    // the group itself is untouched until the invitee accepts
    session
        .services
        .sessions
        .set_invite(
            target.character,
            PendingInvite {
                group,
                inviter: world.character,
                inviter_name: world.shadow.name.clone(),
            },
        )
        .await;
    target
        .packets
        .send(ServerPacket::GroupInviteReceived {
            from: world.shadow.name.clone(),
        })
        .await
        .ok();
    session.out.send(refuse(PartyResult::Ok)).await?;
    Ok(())
}

async fn group_accept(session: &mut Session, world: &mut InWorld) -> Result<()> {
    let invite = match session.services.sessions.take_invite(world.character).await {
        Some(i) => i,
        None => return Ok(()),
    };

    match session
        .services
        .groups
        .invite(invite.group, invite.inviter, world.character)
        .await
    {
        Ok(()) => {
            world
                .node_tx
                .send(RealmToWorld::GroupChanged {
                    character: world.character,
                    group: u64::from(u32::from(invite.group)),
                })
                .await
                .ok();
            broadcast_group_list(session, invite.group).await;
        }
        Err(e) => {
            debug!(character = %world.character, "stale group invite: {e}");
            session
                .out
                .send(ServerPacket::PartyCommandResult {
                    operation: PartyOperation::Invite,
                    member: String::new(),
                    result: PartyResult::NotInGroup,
                })
                .await?;
        }
    }
    Ok(())
}

async fn group_decline(session: &mut Session, world: &mut InWorld) -> Result<()> {
    if let Some(invite) = session.services.sessions.take_invite(world.character).await {
        session
            .services
            .sessions
            .send_packet(
                invite.inviter,
                ServerPacket::GroupDeclineInform(world.shadow.name.clone()),
            )
            .await;
    }
    Ok(())
}

async fn group_uninvite(session: &mut Session, world: &mut InWorld, name: &str) -> Result<()> {
    let group = match session.services.groups.group_of(world.character).await {
        Ok(Some(g)) => g,
        _ => return Ok(()),
    };
    let target = match session.services.characters.get_by_name(name).await {
        Ok(c) => c.id,
        Err(_) => {
            session
                .out
                .send(ServerPacket::PartyCommandResult {
                    operation: PartyOperation::Leave,
                    member: name.to_string(),
                    result: PartyResult::BadPlayerName,
                })
                .await?;
            return Ok(());
        }
    };

    match session
        .services
        .groups
        .kick(group.id, world.character, target)
        .await
    {
        Ok(()) => {
            session
                .services
                .sessions
                .send_packet(target, ServerPacket::GroupDestroyed)
                .await;
            if let Some(handle) = session.services.sessions.get(target).await {
                session
                    .services
                    .nodes
                    .send(
                        handle.node,
                        RealmToWorld::GroupChanged {
                            character: target,
                            group: 0,
                        },
                    )
                    .await;
            }
            broadcast_group_list(session, group.id).await;
        }
        Err(e) => {
            debug!(character = %world.character, "kick refused: {e}");
            session
                .out
                .send(ServerPacket::PartyCommandResult {
                    operation: PartyOperation::Leave,
                    member: name.to_string(),
                    result: PartyResult::NotLeader,
                })
                .await?;
        }
    }
    Ok(())
}

async fn group_set_leader(session: &mut Session, world: &mut InWorld, guid: Guid) -> Result<()> {
    let group = match session.services.groups.group_of(world.character).await {
        Ok(Some(g)) => g,
        _ => return Ok(()),
    };
    let Some(new_leader) = guid.character() else {
        return Ok(());
    };

    if session
        .services
        .groups
        .set_leader(group.id, world.character, new_leader)
        .await
        .is_ok()
    {
        let name = session
            .services
            .sessions
            .get(new_leader)
            .await
            .map(|h| h.card.name)
            .unwrap_or_default();
        for member in &group.members {
            session
                .services
                .sessions
                .send_packet(
                    member.character,
                    ServerPacket::GroupSetLeaderInform(name.clone()),
                )
                .await;
        }
        broadcast_group_list(session, group.id).await;
    }
    Ok(())
}

async fn group_leave(session: &mut Session, world: &mut InWorld) -> Result<()> {
    use aegis_game::groups::GroupRole;

    let group = match session.services.groups.group_of(world.character).await {
        Ok(Some(g)) => g,
        _ => return Ok(()),
    };

    let is_leader = group.role_of(world.character) == Some(GroupRole::Leader);
    if is_leader {
        if session
            .services
            .groups
            .disband(group.id, world.character)
            .await
            .is_ok()
        {
            for member in &group.members {
                session
                    .services
                    .sessions
                    .send_packet(member.character, ServerPacket::GroupDestroyed)
                    .await;
                if let Some(handle) = session.services.sessions.get(member.character).await {
                    session
                        .services
                        .nodes
                        .send(
                            handle.node,
                            RealmToWorld::GroupChanged {
                                character: member.character,
                                group: 0,
                            },
                        )
                        .await;
                }
            }
        }
    } else if session
        .services
        .groups
        .kick(group.id, world.character, world.character)
        .await
        .is_ok()
    {
        session.out.send(ServerPacket::GroupDestroyed).await?;
        world
            .node_tx
            .send(RealmToWorld::GroupChanged {
                character: world.character,
                group: 0,
            })
            .await
            .ok();
        broadcast_group_list(session, group.id).await;
    }
    Ok(())
}

/// Rebuilds and sends the group roster to every online member.
async fn broadcast_group_list(session: &mut Session, group: aegis_game::groups::GroupId) {
    let group = match session.services.groups.get(group).await {
        Ok(g) => g,
        Err(_) => return,
    };

    let mut members = Vec::with_capacity(group.members.len());
    for member in &group.members {
        let (name, online) = match session.services.sessions.get(member.character).await {
            Some(handle) => (handle.card.name, 1u8),
            None => match session.services.characters.get(member.character).await {
                Ok(c) => (c.name, 0),
                Err(_) => continue,
            },
        };
        members.push((
            name,
            Guid::player(member.character, session.services.realm_id).0,
            online,
        ));
    }
    let leader = group
        .leader()
        .map(|l| Guid::player(l, session.services.realm_id).0)
        .unwrap_or_default();

    let packet = ServerPacket::GroupList {
        is_raid: group.members.len() > 5,
        leader,
        members,
    };
    for member in &group.members {
        session
            .services
            .sessions
            .send_packet(member.character, packet.clone())
            .await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use aegis_game::characters::{CharacterId, CharacterSnapshot};
    use aegis_game::realms::RealmId;

    fn shadow() -> CharacterSnapshot {
        CharacterSnapshot {
            id: CharacterId(9),
            name: "ALICE".into(),
            race: 1,
            class: 1,
            gender: 0,
            level: 1,
            map: 0,
            zone: 12,
            position_x: 1.0,
            position_y: 2.0,
            position_z: 3.0,
            orientation: 0.5,
            home_map: 0,
            home_zone: 12,
            home_position: (1.0, 2.0, 3.0),
            money: 0,
            spells: vec![6603],
        }
    }

    #[test]
    fn self_update_block_embeds_the_guid_and_position() {
        let guid = Guid::player(CharacterId(9), RealmId(2));
        let block = build_self_update(guid, &shadow());

        let guid_bytes = guid.0.to_le_bytes();
        assert!(block
            .windows(guid_bytes.len())
            .any(|w| w == guid_bytes), "guid must appear in the block");
        let x_bytes = 1.0f32.to_le_bytes();
        assert!(block.windows(x_bytes.len()).any(|w| w == x_bytes));
    }

    #[test]
    fn transfer_stage_tracks_the_handoff_data() {
        let stage = TransferStage::LeavingWorld {
            map: 530,
            position: (1.0, 2.0, 3.0),
            orientation: 0.0,
        };
        match stage {
            TransferStage::LeavingWorld { map, .. } => assert_eq!(map, 530),
            _ => panic!("wrong stage"),
        }
    }
}
