//! protocol
//!
//! Frames the realm wire protocol over a raw byte stream: a growing
//! receive buffer, decrypted one header at a time via [`FrameCursor`] so a
//! partial read never re-applies the header keystream, and decoded into
//! [`ClientPacket`]/[`ServerPacket`] bodies via `wow_bincode`. Headers are
//! plaintext until a session key is established (`cipher: None`);
//! [`FrameReader::install_cipher`] switches it on for the rest of the
//! connection.

use std::io::{Read as _, Write as _};

use aegis_game::characters::NewCharacter;
use aegis_header_crypto::{
    FrameCursor, RecvHeaderCipher, SendHeaderCipher, INBOUND_HEADER_LEN, OUTBOUND_HEADER_LEN,
};
use aegis_protocol::{
    opcodes::RealmCommand,
    realm::{
        Addon, AuthSession, ChatMessageRequest, ChatType, ClientPacket, ServerPacket, WhoRequest,
    },
    wow_bincode,
};
use anyhow::{anyhow, Context, Result};
use async_std::io::{Read, ReadExt, Write, WriteExt};
use bincode::Options;
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::trace;

/// Reads frames off a client connection, buffering partial reads and
/// decrypting headers at most once per frame.
pub struct FrameReader {
    buf: Vec<u8>,
    cursor: FrameCursor,
    cipher: Option<RecvHeaderCipher>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            cursor: FrameCursor::new(),
            cipher: None,
        }
    }

    /// Switches header decryption on for the rest of the connection, once
    /// a session key has been negotiated.
    pub fn install_cipher(&mut self, cipher: RecvHeaderCipher) {
        self.cipher = Some(cipher);
    }

    /// Reads one full frame, pulling more bytes from `stream` as needed.
    /// Returns the opcode and raw body bytes.
    pub async fn next_frame<R>(&mut self, stream: &mut R) -> Result<(u16, Vec<u8>)>
    where
        R: Read + Unpin,
    {
        loop {
            if let Some(frame) = self.try_take_frame()? {
                return Ok(frame);
            }

            let mut chunk = [0u8; 4096];
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(anyhow!("connection closed"));
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn try_take_frame(&mut self) -> Result<Option<(u16, Vec<u8>)>> {
        if self.buf.len() < INBOUND_HEADER_LEN {
            return Ok(None);
        }

        if let Some(cipher) = self.cipher.as_mut() {
            self.cursor.decrypt_header(cipher, &mut self.buf, 0);
        }

        let header: [u8; INBOUND_HEADER_LEN] = self.buf[..INBOUND_HEADER_LEN]
            .try_into()
            .expect("checked length above");
        let (size_be, opcode): (u16, u16) = wow_bincode()
            .deserialize(&header)
            .context("malformed frame header")?;
        let size = size_be.swap_bytes() as usize;
        if size < 2 {
            return Err(anyhow!("frame size {size} too small to hold an opcode"));
        }
        let body_len = size - 2;

        if self.buf.len() < INBOUND_HEADER_LEN + body_len {
            return Ok(None);
        }

        let body = self.buf[INBOUND_HEADER_LEN..INBOUND_HEADER_LEN + body_len].to_vec();
        self.buf.drain(..INBOUND_HEADER_LEN + body_len);
        self.cursor.reset();

        trace!(opcode, size, "read realm frame");
        Ok(Some((opcode, body)))
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames and writes one raw `(opcode, body)` pair, encrypting the header
/// when a send cipher has been installed.
pub async fn write_frame<W>(
    stream: &mut W,
    cipher: &mut Option<SendHeaderCipher>,
    opcode: u16,
    body: &[u8],
) -> Result<()>
where
    W: Write + Unpin,
{
    let mut header = [0u8; OUTBOUND_HEADER_LEN];
    header[..2].copy_from_slice(&((body.len() as u16 + 2).swap_bytes()).to_le_bytes());
    header[2..4].copy_from_slice(&opcode.to_le_bytes());
    if let Some(cipher) = cipher.as_mut() {
        cipher.encrypt(&mut header);
    }

    stream.write_all(&header).await?;
    stream.write_all(body).await?;
    Ok(())
}

/// Writes one server packet through [`write_frame`].
pub async fn write_packet<W>(
    stream: &mut W,
    cipher: &mut Option<SendHeaderCipher>,
    packet: &ServerPacket,
) -> Result<()>
where
    W: Write + Unpin,
{
    let (opcode, body) = encode_server_packet(packet)?;
    write_frame(stream, cipher, opcode, &body).await
}

/// Flags bitfield shown per character on the char-select screen; only the
/// forced-rename bit matters to this realm.
const CHAR_FLAG_RENAME: u32 = 0x0000_4000;

pub fn encode_server_packet(packet: &ServerPacket) -> Result<(u16, Vec<u8>)> {
    let (opcode, body) = match packet {
        ServerPacket::AuthResponse { code, expansion } => (
            RealmCommand::AuthResponse,
            wow_bincode().serialize(&(code, 0u32, 0u8, 0u8, expansion))?,
        ),
        ServerPacket::AddonInfo(addons) => {
            let mut body = Vec::new();
            for addon in addons {
                let known = addon.crc == 0x4C1C776D;
                body.extend_from_slice(&[2, 1, u8::from(!known), 0, 0, 0, 0, 0]);
            }
            body.push(0);
            (RealmCommand::AddonInfo, body)
        }
        ServerPacket::ClientCacheVersion(v) => {
            (RealmCommand::ClientCacheVersion, wow_bincode().serialize(v)?)
        }
        ServerPacket::TutorialData(flags) => {
            (RealmCommand::TutorialFlags, wow_bincode().serialize(flags)?)
        }
        ServerPacket::Pong(seq) => (RealmCommand::Pong, wow_bincode().serialize(seq)?),

        ServerPacket::CharEnum(entries) => {
            let mut body = vec![entries.len() as u8];
            for entry in entries {
                let c = &entry.character;
                let mut flags = 0u32;
                if c.at_login_rename {
                    flags |= CHAR_FLAG_RENAME;
                }
                body.extend(wow_bincode().serialize(&(
                    entry.guid.0,
                    &c.name,
                    c.race,
                    c.class,
                    c.gender,
                    c.skin_color,
                    c.face,
                    c.hair_style,
                    c.hair_color,
                    c.facial_style,
                    c.level,
                ))?);
                body.extend(wow_bincode().serialize(&(
                    c.zone,
                    c.map,
                    c.position_x,
                    c.position_y,
                    c.position_z,
                    entry.guild,
                    flags,
                    u8::from(entry.first_login),
                    0u32, // pet display id
                    0u32, // pet level
                    0u32, // pet family
                ))?);
                for slot in &entry.equipment {
                    body.extend(wow_bincode().serialize(&(
                        slot.display_id,
                        slot.inventory_type,
                        slot.enchant_aura_id,
                    ))?);
                }
            }
            (RealmCommand::CharEnum, body)
        }
        ServerPacket::RealmSplit { realm } => (
            RealmCommand::RealmSplit,
            wow_bincode().serialize(&(realm, 0u32, "01/01/01"))?,
        ),
        ServerPacket::CharCreate(code) => {
            (RealmCommand::CharCreate, wow_bincode().serialize(code)?)
        }
        ServerPacket::CharDelete(code) => {
            (RealmCommand::CharDelete, wow_bincode().serialize(code)?)
        }
        ServerPacket::CharRename { character, name, result } => (
            RealmCommand::CharRename,
            wow_bincode().serialize(&(result, character.0 as u64, name))?,
        ),
        ServerPacket::CharLoginFailed(code) => {
            (RealmCommand::CharLoginFailed, wow_bincode().serialize(code)?)
        }

        ServerPacket::SetDungeonDifficulty(difficulty) => (
            RealmCommand::SetDungeonDifficulty,
            wow_bincode().serialize(&(difficulty, 1u32, 0u32))?,
        ),
        ServerPacket::LoginVerifyWorld { map, x, y, z, orientation } => (
            RealmCommand::LoginVerifyWorld,
            wow_bincode().serialize(&(map, x, y, z, orientation))?,
        ),
        ServerPacket::AccountDataTimes(times) => {
            (RealmCommand::AccountDataTimes, wow_bincode().serialize(times)?)
        }
        ServerPacket::FeatureSystemStatus => (
            RealmCommand::FeatureSystemStatus,
            wow_bincode().serialize(&(2u8, 0u8))?,
        ),
        ServerPacket::Motd(lines) => {
            let mut body = wow_bincode().serialize(&(lines.len() as u32))?;
            for line in lines {
                body.extend(wow_bincode().serialize(line)?);
            }
            (RealmCommand::Motd, body)
        }
        ServerPacket::SetRestStart(rest) => {
            (RealmCommand::SetRestStart, wow_bincode().serialize(rest)?)
        }
        ServerPacket::BindPointUpdate { position, map, zone } => (
            RealmCommand::BindPointUpdate,
            wow_bincode().serialize(&(position.0, position.1, position.2, map, zone))?,
        ),
        ServerPacket::InitialSpells(spells) => {
            let mut body = wow_bincode().serialize(&(0u8, spells.len() as u16))?;
            for spell in spells {
                body.extend(wow_bincode().serialize(&(*spell as u16, 0u16))?);
            }
            // no cooldowns carried over
            body.extend(wow_bincode().serialize(&0u16)?);
            (RealmCommand::InitialSpells, body)
        }
        ServerPacket::ActionButtons(buttons) => {
            const MAX_ACTION_BUTTONS: usize = 132;
            let mut packed = [0u32; MAX_ACTION_BUTTONS];
            for button in buttons {
                if let Some(slot) = packed.get_mut(button.button as usize) {
                    *slot = (button.action & 0x00FF_FFFF) | (u32::from(button.kind) << 24);
                }
            }
            let mut body = Vec::with_capacity(MAX_ACTION_BUTTONS * 4);
            for slot in packed {
                body.extend(slot.to_le_bytes());
            }
            (RealmCommand::ActionButtons, body)
        }
        ServerPacket::InitializeFactions => {
            const FACTION_COUNT: u32 = 0x40;
            let mut body = wow_bincode().serialize(&FACTION_COUNT)?;
            for _ in 0..FACTION_COUNT {
                body.extend(wow_bincode().serialize(&(0u8, 0u32))?);
            }
            (RealmCommand::InitializeFactions, body)
        }
        ServerPacket::InitWorldStates { map, zone } => (
            RealmCommand::InitWorldStates,
            wow_bincode().serialize(&(map, zone, 0u16))?,
        ),
        ServerPacket::LoginSetTimeSpeed { game_time, speed } => (
            RealmCommand::LoginSetTimeSpeed,
            wow_bincode().serialize(&(game_time, speed))?,
        ),
        ServerPacket::TriggerCinematic(cinematic) => {
            (RealmCommand::TriggerCinematic, wow_bincode().serialize(cinematic)?)
        }
        ServerPacket::CompressedSelfUpdate(block) => {
            let mut body = wow_bincode().serialize(&(block.len() as u32))?;
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(block)?;
            body.extend(encoder.finish()?);
            (RealmCommand::CompressedUpdateObject, body)
        }
        ServerPacket::TimeSyncRequest(counter) => {
            (RealmCommand::TimeSyncRequest, wow_bincode().serialize(counter)?)
        }

        ServerPacket::SocialList(entries) => {
            let mut body = vec![entries.len() as u8];
            for entry in entries {
                body.extend(wow_bincode().serialize(&(
                    entry.guid,
                    entry.flags,
                    &entry.note,
                    entry.status,
                ))?);
            }
            (RealmCommand::FriendListResponse, body)
        }
        ServerPacket::FriendStatus { guid, online } => (
            RealmCommand::FriendStatus,
            wow_bincode().serialize(&(if *online { 2u8 } else { 1u8 }, guid))?,
        ),
        ServerPacket::NameQueryResponse { guid, name, realm, race, gender, class } => (
            RealmCommand::NameQueryResponse,
            wow_bincode().serialize(&(guid, name, realm, race, gender, class, 0u8))?,
        ),
        ServerPacket::WhoResponse(entries) => {
            let mut body =
                wow_bincode().serialize(&(entries.len() as u32, entries.len() as u32))?;
            for entry in entries {
                body.extend(wow_bincode().serialize(&(
                    &entry.name,
                    &entry.guild,
                    entry.level,
                    entry.class,
                    entry.race,
                    entry.zone,
                ))?);
            }
            (RealmCommand::WhoResponse, body)
        }
        ServerPacket::ChatDelivered { chat_type, language, sender, message } => {
            let mut body = wow_bincode().serialize(&(chat_type, language, sender))?;
            body.extend(wow_bincode().serialize(&(message.len() as u32 + 1, message, 0u8))?);
            (RealmCommand::ChatDelivered, body)
        }

        ServerPacket::ChatPlayerNotFound(name) => {
            (RealmCommand::ChatPlayerNotFound, wow_bincode().serialize(name)?)
        }
        ServerPacket::ChatWrongFaction => (RealmCommand::ChatWrongFaction, Vec::new()),

        ServerPacket::GroupInviteReceived { from } => (
            RealmCommand::GroupInviteReceived,
            wow_bincode().serialize(&(1u8, from))?,
        ),
        ServerPacket::GroupDeclineInform(name) => {
            (RealmCommand::GroupDeclineInform, wow_bincode().serialize(name)?)
        }
        ServerPacket::GroupSetLeaderInform(name) => {
            (RealmCommand::GroupSetLeaderInform, wow_bincode().serialize(name)?)
        }
        ServerPacket::GroupDestroyed => (RealmCommand::GroupDestroyed, Vec::new()),
        ServerPacket::GroupList { is_raid, leader, members } => {
            let mut body = wow_bincode()
                .serialize(&(u8::from(*is_raid), 0u8, members.len() as u32))?;
            for (name, guid, online) in members {
                body.extend(wow_bincode().serialize(&(name, guid, online))?);
            }
            body.extend(wow_bincode().serialize(leader)?);
            (RealmCommand::GroupList, body)
        }
        ServerPacket::PartyCommandResult { operation, member, result } => (
            RealmCommand::PartyCommandResult,
            wow_bincode().serialize(&(u32::from(u8::from(*operation)), member, u32::from(u8::from(*result))))?,
        ),

        ServerPacket::MailListResult(entries) => {
            let mut body = vec![entries.len() as u8];
            for mail in entries {
                body.extend(wow_bincode().serialize(&(
                    mail.id,
                    mail.sender,
                    &mail.subject,
                    mail.money,
                    u8::from(mail.read),
                ))?);
            }
            (RealmCommand::MailListResult, body)
        }
        ServerPacket::LogoutResponse { allowed } => (
            RealmCommand::LogoutResponse,
            wow_bincode().serialize(&(0u32, u8::from(!*allowed)))?,
        ),
        ServerPacket::LogoutComplete => (RealmCommand::LogoutComplete, Vec::new()),

        ServerPacket::TransferPending { map } => {
            (RealmCommand::TransferPending, wow_bincode().serialize(map)?)
        }
        ServerPacket::NewWorld { map, x, y, z, orientation } => (
            RealmCommand::NewWorld,
            wow_bincode().serialize(&(map, x, y, z, orientation))?,
        ),
        ServerPacket::TransferAborted => (
            RealmCommand::TransferAborted,
            wow_bincode().serialize(&(0u32, 0u8))?,
        ),

        ServerPacket::Proxy { opcode, body } => return Ok((*opcode, body.clone())),
    };

    Ok((u16::from(opcode), body))
}

/// Parses a client frame body into a [`ClientPacket`], given the opcode
/// already split off by [`FrameReader`]. Unknown opcodes come back as an
/// error; whether that means "drop" or "proxy to the world node" is the
/// session's call, depending on its phase.
pub fn decode_client_packet(opcode: u16, body: &[u8]) -> Result<ClientPacket> {
    let command =
        RealmCommand::try_from(opcode).map_err(|_| anyhow!("unsupported opcode {opcode:#x}"))?;

    match command {
        RealmCommand::AuthSession => decode_auth_session(body).map(ClientPacket::AuthSession),
        RealmCommand::KeepAlive => Ok(ClientPacket::KeepAlive),
        RealmCommand::Ping => {
            let (seq, latency): (u32, u32) = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::Ping { seq, latency })
        }
        RealmCommand::ReadyForAccountDataTimes => Ok(ClientPacket::ReadyForAccountDataTimes),
        RealmCommand::CharEnum => Ok(ClientPacket::CharEnum),
        RealmCommand::CharCreate => decode_char_create(body).map(ClientPacket::CharCreate),
        RealmCommand::CharDelete => {
            let id: u64 = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::CharDelete((id as u32).into()))
        }
        RealmCommand::CharRename => {
            let (id, name): (u64, String) = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::CharRename { character: (id as u32).into(), name })
        }
        RealmCommand::RealmSplit => {
            let realm: u32 = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::RealmSplit { realm })
        }
        RealmCommand::PlayerLogin => {
            let id: u64 = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::PlayerLogin((id as u32).into()))
        }
        RealmCommand::LogoutRequest => Ok(ClientPacket::LogoutRequest),
        RealmCommand::MoveWorldPortAck => Ok(ClientPacket::MoveWorldPortAck),
        RealmCommand::TimeSyncResponse => {
            let (counter, ticks): (u32, u32) = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::TimeSyncResponse { counter, ticks })
        }

        RealmCommand::NameQuery => {
            let guid: u64 = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::NameQuery(aegis_game::guid::Guid(guid)))
        }
        RealmCommand::Who => decode_who(body).map(ClientPacket::Who),
        RealmCommand::MessageChat => decode_message_chat(body).map(ClientPacket::MessageChat),

        RealmCommand::TutorialFlag => {
            let flag: u32 = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::TutorialFlag(flag))
        }
        RealmCommand::TutorialClear => Ok(ClientPacket::TutorialClear),
        RealmCommand::TutorialReset => Ok(ClientPacket::TutorialReset),
        RealmCommand::SetActionButton => {
            let (button, packed): (u8, u32) = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::SetActionButton {
                button,
                action: packed & 0x00FF_FFFF,
                kind: (packed >> 24) as u8,
            })
        }

        RealmCommand::FriendList => Ok(ClientPacket::FriendList),
        RealmCommand::AddFriend => {
            let (name, note): (String, String) = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::AddFriend { name, note })
        }
        RealmCommand::DelFriend => {
            let guid: u64 = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::DelFriend(aegis_game::guid::Guid(guid)))
        }
        RealmCommand::AddIgnore => {
            let name: String = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::AddIgnore { name })
        }
        RealmCommand::DelIgnore => {
            let guid: u64 = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::DelIgnore(aegis_game::guid::Guid(guid)))
        }

        RealmCommand::GroupInvite => {
            let name: String = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::GroupInvite { name })
        }
        RealmCommand::GroupAccept => Ok(ClientPacket::GroupAccept),
        RealmCommand::GroupDecline => Ok(ClientPacket::GroupDecline),
        RealmCommand::GroupUninvite => {
            let name: String = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::GroupUninvite { name })
        }
        RealmCommand::GroupSetLeader => {
            let guid: u64 = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::GroupSetLeader(aegis_game::guid::Guid(guid)))
        }
        RealmCommand::GroupAssistant => {
            let (guid, assistant): (u64, u8) = wow_bincode().deserialize(body)?;
            Ok(ClientPacket::GroupAssistant {
                target: aegis_game::guid::Guid(guid),
                assistant: assistant != 0,
            })
        }
        RealmCommand::LootMethod => {
            let (method, master, threshold): (u32, u64, u32) =
                wow_bincode().deserialize(body)?;
            Ok(ClientPacket::LootMethod {
                method: method as u8,
                master: aegis_game::guid::Guid(master),
                threshold,
            })
        }
        RealmCommand::GroupDisband => Ok(ClientPacket::GroupDisband),

        other => Err(anyhow!("opcode {other:?} is not client-originated")),
    }
}

fn decode_who(body: &[u8]) -> Result<WhoRequest> {
    let (min_level, max_level, player_name, guild_name, race_mask, class_mask, zone_count): (
        u32,
        u32,
        String,
        String,
        u32,
        u32,
        u32,
    ) = wow_bincode().deserialize(body)?;

    // re-walk the variable-length prefix to find where the zone list starts
    let fixed_len = 4 + 4 + player_name.len() + 1 + guild_name.len() + 1 + 4 + 4 + 4;
    let mut cursor = fixed_len;

    // an oversized count here is an attack, not a big request
    if zone_count > 64 {
        return Err(anyhow!("who request claims {zone_count} zones"));
    }
    let mut zones = Vec::with_capacity(zone_count as usize);
    for _ in 0..zone_count {
        let end = cursor + 4;
        let zone: u32 = wow_bincode().deserialize(
            body.get(cursor..end).ok_or_else(|| anyhow!("who request truncated"))?,
        )?;
        zones.push(zone);
        cursor = end;
    }

    let string_count: u32 = wow_bincode().deserialize(
        body.get(cursor..cursor + 4)
            .ok_or_else(|| anyhow!("who request truncated"))?,
    )?;
    cursor += 4;
    if string_count > 64 {
        return Err(anyhow!("who request claims {string_count} strings"));
    }
    let mut strings = Vec::with_capacity(string_count as usize);
    for _ in 0..string_count {
        let rest = &body[cursor.min(body.len())..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow!("who search string not null-terminated"))?;
        strings.push(std::str::from_utf8(&rest[..end])?.to_string());
        cursor += end + 1;
    }

    Ok(WhoRequest {
        min_level,
        max_level,
        player_name,
        guild_name,
        race_mask,
        class_mask,
        zones,
        strings,
    })
}

fn decode_message_chat(body: &[u8]) -> Result<ChatMessageRequest> {
    let (raw_type, language): (u32, u32) = wow_bincode().deserialize(body)?;
    let chat_type = ChatType::try_from(raw_type as u8)
        .map_err(|_| anyhow!("unknown chat type {raw_type}"))?;

    let mut cursor = 8;
    let mut read_string = || -> Result<String> {
        let rest = &body[cursor.min(body.len())..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow!("chat string not null-terminated"))?;
        let s = std::str::from_utf8(&rest[..end])?.to_string();
        cursor += end + 1;
        Ok(s)
    };

    let (recipient, channel) = match chat_type {
        ChatType::Whisper => (Some(read_string()?), None),
        ChatType::Channel => (None, Some(read_string()?)),
        _ => (None, None),
    };
    let message = read_string()?;

    Ok(ChatMessageRequest {
        chat_type,
        language,
        recipient,
        channel,
        message,
    })
}

fn decode_char_create(body: &[u8]) -> Result<NewCharacter> {
    let str_end = body
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| anyhow!("char-create name not null-terminated"))?;
    let name = std::str::from_utf8(&body[..str_end])?.to_string();

    let (race, class, gender, skin_color, face, hair_style, hair_color, facial_style): (
        u8,
        u8,
        u8,
        u8,
        u8,
        u8,
        u8,
        u8,
    ) = wow_bincode().deserialize(&body[str_end + 1..])?;

    Ok(NewCharacter {
        name,
        race,
        class,
        gender,
        skin_color,
        face,
        hair_style,
        hair_color,
        facial_style,
    })
}

fn decode_auth_session(buffer: &[u8]) -> Result<AuthSession> {
    let str_end = buffer
        .iter()
        .enumerate()
        .skip(4 + 4)
        .find_map(|(i, &x)| if x == 0 { Some(i) } else { None })
        .ok_or_else(|| anyhow!("could not find end of username"))?;

    // build(4) + server_id(4) + username + nul + login_server_type(4) +
    // local_challenge(4) + region_id(4) + battlegroup_id(4) + realm_id(4) +
    // dos_response(8) + client_proof(20)
    let addon_start = str_end + 1 + 4 + 4 + 4 + 4 + 4 + 8 + 20;
    if buffer.len() < addon_start {
        return Err(anyhow!("auth session packet truncated before addon block"));
    }
    let fixed = &buffer[..addon_start];
    let compressed = &buffer[addon_start..];

    let (build, _server_id, username, _login_server_type, local_challenge, _region_id, _bg, _realm_id, _dos, client_proof): (
        u32,
        u32,
        String,
        u32,
        [u8; 4],
        u32,
        u32,
        u32,
        u64,
        [u8; 20],
    ) = wow_bincode().deserialize(fixed)?;

    let addons = decode_addons(compressed)?;

    Ok(AuthSession {
        build,
        username: username.to_ascii_uppercase(),
        local_challenge,
        client_proof,
        addons,
    })
}

fn decode_addons(compressed: &[u8]) -> Result<Vec<Addon>> {
    if compressed.len() < 4 {
        return Ok(Vec::new());
    }

    let expected_size = wow_bincode().deserialize::<u32>(&compressed[..4])? as usize;
    let mut decoder = ZlibDecoder::new(&compressed[4..]);
    let mut unzipped = Vec::with_capacity(expected_size);
    let size = decoder.read_to_end(&mut unzipped)?;
    if size != expected_size {
        return Err(anyhow!(
            "addon data not correctly decompressed, expected {expected_size} got {size}"
        ));
    }

    let addon_count: u32 = wow_bincode().deserialize(&unzipped[..4])?;
    let mut cursor = 4;
    (0..addon_count)
        .map(|_| {
            let rest = &unzipped[cursor..];
            let idx = rest
                .iter()
                .position(|&x| x == 0)
                .ok_or_else(|| anyhow!("addon name not null-terminated"))?;
            let name = std::str::from_utf8(&rest[..idx])?.to_string();
            let (has_sig, crc, _crc2): (u8, u32, u32) =
                wow_bincode().deserialize(&rest[idx + 1..idx + 1 + 9])?;
            cursor += idx + 1 + 9;
            Ok(Addon {
                name,
                uses_public_key: has_sig == 1,
                crc,
                version: 0,
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use aegis_game::{characters::CharacterId, guid::Guid, realms::RealmId};
    use aegis_protocol::realm::{CharEnumEntry, EquipSlot, CHAR_ENUM_EQUIPMENT_SLOTS};
    use async_std::io::Cursor;

    use super::*;

    fn auth_session_body(username: &str) -> Vec<u8> {
        let mut buf = wow_bincode()
            .serialize(&(
                8606u32,        // build
                0u32,           // server_id
                username.to_string(),
                0u32, // login_server_type
                [1u8, 2, 3, 4], // local_challenge
                0u32, // region_id
                0u32, // battlegroup_id
                0u32, // realm_id
                0u64, // dos_response
                [0u8; 20], // client_proof
            ))
            .unwrap();
        buf.extend_from_slice(&[]); // no addon blob
        buf
    }

    #[test]
    fn decodes_auth_session_body() {
        let body = auth_session_body("PLAYER");
        let session = decode_auth_session(&body).unwrap();
        assert_eq!(session.username, "PLAYER");
        assert_eq!(session.build, 8606);
        assert_eq!(session.local_challenge, [1, 2, 3, 4]);
        assert!(session.addons.is_empty());
    }

    #[test]
    fn decode_client_packet_rejects_unknown_opcode() {
        assert!(decode_client_packet(0xFFFF, &[]).is_err());
    }

    #[test]
    fn decode_client_packet_reads_ping() {
        let body = wow_bincode().serialize(&(7u32, 50u32)).unwrap();
        let packet = decode_client_packet(u16::from(RealmCommand::Ping), &body).unwrap();
        assert!(matches!(packet, ClientPacket::Ping { seq: 7, latency: 50 }));
    }

    #[test]
    fn decodes_a_whisper() {
        let mut body = wow_bincode()
            .serialize(&(u32::from(u8::from(ChatType::Whisper)), 0u32))
            .unwrap();
        body.extend(wow_bincode().serialize("VICTIM").unwrap());
        body.extend(wow_bincode().serialize("psst").unwrap());

        let packet = decode_message_chat(&body).unwrap();
        assert_eq!(packet.chat_type, ChatType::Whisper);
        assert_eq!(packet.recipient.as_deref(), Some("VICTIM"));
        assert_eq!(packet.message, "psst");
    }

    #[test]
    fn decodes_a_who_filter_with_zones_and_strings() {
        let mut body = wow_bincode()
            .serialize(&(10u32, 70u32, "", "", 0u32, 0u32, 2u32))
            .unwrap();
        body.extend(wow_bincode().serialize(&12u32).unwrap());
        body.extend(wow_bincode().serialize(&14u32).unwrap());
        body.extend(wow_bincode().serialize(&1u32).unwrap());
        body.extend(wow_bincode().serialize("smith").unwrap());

        let who = decode_who(&body).unwrap();
        assert_eq!(who.min_level, 10);
        assert_eq!(who.zones, vec![12, 14]);
        assert_eq!(who.strings, vec!["smith".to_string()]);
    }

    #[test]
    fn char_enum_low_guid_bits_are_the_database_id() {
        let character = aegis_game::characters::Character {
            id: CharacterId(42),
            account: aegis_game::accounts::AccountId(1),
            name: "ALICE".into(),
            level: 10,
            race: 1,
            class: 1,
            gender: 0,
            skin_color: 0,
            face: 0,
            hair_style: 0,
            hair_color: 0,
            facial_style: 0,
            zone: 12,
            map: 0,
            position_x: 0.0,
            position_y: 0.0,
            position_z: 0.0,
            orientation: 0.0,
            money: 0,
            at_login_rename: false,
        };
        let entry = CharEnumEntry {
            guid: Guid::player(character.id, RealmId(5)),
            character,
            guild: 0,
            first_login: false,
            equipment: [EquipSlot::default(); CHAR_ENUM_EQUIPMENT_SLOTS],
        };

        let (opcode, body) =
            encode_server_packet(&ServerPacket::CharEnum(vec![entry])).unwrap();
        assert_eq!(opcode, u16::from(RealmCommand::CharEnum));
        assert_eq!(body[0], 1, "one character");

        let wire_guid = u64::from_le_bytes(body[1..9].try_into().unwrap());
        assert_eq!((wire_guid & 0xFFFF_FFFF) as u32, 42);
        assert_eq!(Guid(wire_guid).character(), Some(CharacterId(42)));
    }

    #[test]
    fn proxied_bodies_cross_byte_identical() {
        let body = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let (opcode, encoded) = encode_server_packet(&ServerPacket::Proxy {
            opcode: 0x1234,
            body: body.clone(),
        })
        .unwrap();
        assert_eq!(opcode, 0x1234);
        assert_eq!(encoded, body, "only the header framing may change");
    }

    #[async_std::test]
    async fn frame_reader_decodes_a_plaintext_frame() {
        let opcode = u16::from(RealmCommand::KeepAlive);
        let body = b"hi".to_vec();

        let mut frame = vec![0u8; INBOUND_HEADER_LEN];
        frame[..2].copy_from_slice(&((body.len() as u16 + 2).swap_bytes()).to_le_bytes());
        frame[2..4].copy_from_slice(&opcode.to_le_bytes());
        frame.extend_from_slice(&body);

        let mut stream = Cursor::new(frame);
        let mut reader = FrameReader::new();
        let (read_opcode, read_body) = reader.next_frame(&mut stream).await.unwrap();

        assert_eq!(read_opcode, opcode);
        assert_eq!(read_body, body);
    }

    #[async_std::test]
    async fn encrypted_frames_decode_after_cipher_install() {
        let key = [3u8; 40];
        // RC4 is xor-symmetric: a second recv stream at the same position
        // stands in for the client's header encryption.
        let (_, mut client_side) = aegis_header_crypto::HeaderCrypto::new(&key).into_split();
        let (_, server_recv) = aegis_header_crypto::HeaderCrypto::new(&key).into_split();

        let opcode = u16::from(RealmCommand::KeepAlive);
        let body = b"xy";
        let mut frame = Vec::new();
        let mut header = [0u8; INBOUND_HEADER_LEN];
        header[..2].copy_from_slice(&((body.len() as u16 + 2).swap_bytes()).to_le_bytes());
        header[2..4].copy_from_slice(&opcode.to_le_bytes());
        client_side.decrypt(&mut header);
        frame.extend_from_slice(&header);
        frame.extend_from_slice(body);

        let mut reader = FrameReader::new();
        reader.install_cipher(server_recv);
        let mut stream = Cursor::new(frame);
        let (read_opcode, read_body) = reader.next_frame(&mut stream).await.unwrap();
        assert_eq!(read_opcode, opcode);
        assert_eq!(read_body, body);
    }
}
