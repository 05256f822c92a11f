//! protocol
//!
//! Reads one client message at a time off the wire: a 1-byte opcode
//! followed by a fixed-size, fixint-encoded body (plus, for the two
//! challenge commands, a trailing length-prefixed username that is not
//! part of the `wow_bincode` body itself).

use aegis_protocol::{
    login::{ConnectProof, ConnectRequest, RealmListRequest, ReconnectProof, ReplyPacket},
    opcodes::AuthCommand,
    wow_bincode,
};
use anyhow::{anyhow, Context, Result};
use async_std::{io::ReadExt, prelude::*};
use bincode::Options;
use thiserror::Error;
use tracing::trace;

/// A single client-originated login-protocol message, with its username
/// already split out for the two challenge commands.
#[derive(Debug)]
pub enum ClientMessage {
    Connect { request: ConnectRequest, username: String },
    Reconnect { request: ConnectRequest, username: String },
    Proof(ConnectProof),
    ReconnectProof(ReconnectProof),
    RealmList,
}

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("connection closed")]
    Closed,
    #[error("no packet within the idle window")]
    IdleTimeout,
    #[error("unsupported opcode {0:#x}")]
    UnsupportedCommand(u8),
    #[error("malformed body: {0}")]
    Malformed(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

const CONNECT_REQUEST_LEN: usize = 33;
const CONNECT_PROOF_LEN: usize = 74;
const RECONNECT_PROOF_LEN: usize = 57;
const REALM_LIST_REQUEST_LEN: usize = 4;

/// Reads exactly one message, or `None` if the peer closed the socket
/// cleanly before sending an opcode byte.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<ClientMessage>, ReadError>
where
    R: async_std::io::Read + Unpin,
{
    let mut opcode = [0u8; 1];
    if reader.read(&mut opcode).await? == 0 {
        return Ok(None);
    }

    let command = AuthCommand::try_from(opcode[0])
        .map_err(|_| ReadError::UnsupportedCommand(opcode[0]))?;
    trace!(?command, "read opcode");

    let message = match command {
        AuthCommand::ConnectRequest => {
            let (request, username) = read_connect_request(reader).await?;
            ClientMessage::Connect { request, username }
        }
        AuthCommand::AuthReconnectChallenge => {
            let (request, username) = read_connect_request(reader).await?;
            ClientMessage::Reconnect { request, username }
        }
        AuthCommand::AuthLogonProof => {
            let mut buffer = [0u8; CONNECT_PROOF_LEN];
            reader.read_exact(&mut buffer).await?;
            ClientMessage::Proof(wow_bincode().deserialize(&buffer)?)
        }
        AuthCommand::AuthReconnectProof => {
            let mut buffer = [0u8; RECONNECT_PROOF_LEN];
            reader.read_exact(&mut buffer).await?;
            ClientMessage::ReconnectProof(wow_bincode().deserialize(&buffer)?)
        }
        AuthCommand::RealmList => {
            let mut buffer = [0u8; REALM_LIST_REQUEST_LEN];
            reader.read_exact(&mut buffer).await?;
            let _request: RealmListRequest = wow_bincode().deserialize(&buffer)?;
            ClientMessage::RealmList
        }
        other => return Err(ReadError::UnsupportedCommand(other.into())),
    };

    Ok(Some(message))
}

async fn read_connect_request<R>(reader: &mut R) -> Result<(ConnectRequest, String), ReadError>
where
    R: async_std::io::Read + Unpin,
{
    let mut buffer = [0u8; CONNECT_REQUEST_LEN];
    reader.read_exact(&mut buffer).await?;
    let request: ConnectRequest = wow_bincode().deserialize(&buffer)?;

    let mut username = vec![0u8; request.username_len as usize];
    reader.read_exact(&mut username).await?;
    let username = String::from_utf8_lossy(&username).to_ascii_uppercase();

    Ok((request, username))
}

pub async fn send_reply<W, T>(
    writer: &mut W,
    opcode: AuthCommand,
    body: &T,
) -> Result<()>
where
    W: async_std::io::Write + Unpin,
    T: serde::Serialize,
{
    let packet = wow_bincode()
        .serialize(&ReplyPacket::new(opcode, body))
        .context("failed to serialize reply")?;
    writer
        .write_all(&packet)
        .await
        .map_err(|e| anyhow!("failed to write reply: {e}"))
}
