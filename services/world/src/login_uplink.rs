//! login_uplink
//!
//! The realm's client of the login service's uplink: registers with the
//! shared-secret proof on connect, then carries session-key lookups for
//! every client that reaches `AuthSession`, population updates, tutorial
//! writebacks and keep-alives. The realm holds no account store of its
//! own; this channel is its only source of account truth.

use std::{sync::Arc, time::Duration};

use aegis_game::{accounts::AccountId, realms::RealmId};
use aegis_protocol::{
    uplink::{LoginToRealm, RealmLogin, RealmLoginResult, RealmToLogin, UPLINK_PROTOCOL_VERSION},
    wow_bincode,
};
use anyhow::{anyhow, bail, Result};
use async_std::{
    io::{ReadExt, WriteExt},
    net::TcpStream,
    sync::Mutex,
    task,
};
use bincode::Options;
use sha1::{Digest, Sha1};
use tracing::{info, warn};

/// How often the realm pings the login service; the login side drops an
/// uplink idle for 30 seconds.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// What the login service hands back for a live session.
#[derive(Debug, Clone)]
pub struct PlayerLoginReply {
    pub account: AccountId,
    pub username: String,
    pub session_key: [u8; 40],
    pub verifier: [u8; 32],
    pub salt: [u8; 32],
    pub tutorial: [u32; 8],
}

/// A connection to the login service's realm-uplink listener, registered
/// and ready to field `PlayerLogin` lookups.
pub struct LoginUplink {
    stream: Mutex<TcpStream>,
}

impl std::fmt::Debug for LoginUplink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginUplink").finish_non_exhaustive()
    }
}

/// What a realm presents when registering.
#[derive(Debug, Clone)]
pub struct RealmIdentity {
    pub id: RealmId,
    pub internal_name: String,
    pub shared_secret: [u8; 32],
    pub visible_name: String,
    pub host: String,
    pub port: u16,
}

impl LoginUplink {
    /// Connects to the login service and proves this realm's identity.
    /// Fails the same way a bad realm-registry row would: there's no
    /// point running a realm the login service won't recognize.
    pub async fn connect(addr: &str, identity: &RealmIdentity) -> Result<Self> {
        let mut stream = TcpStream::connect(addr).await?;

        let proof: [u8; 20] = Sha1::digest(identity.shared_secret).into();
        write_frame(
            &mut stream,
            &RealmToLogin::Login(RealmLogin {
                protocol_version: UPLINK_PROTOCOL_VERSION,
                realm_id: identity.id,
                internal_name: identity.internal_name.clone(),
                password_proof: proof,
                visible_name: identity.visible_name.clone(),
                host: identity.host.clone(),
                port: identity.port,
            }),
        )
        .await?;

        match read_frame::<LoginToRealm>(&mut stream).await? {
            LoginToRealm::LoginResult(RealmLoginResult::Success) => {
                info!(realm = %identity.id, "registered with login service at {addr}");
            }
            LoginToRealm::LoginResult(other) => {
                bail!("login service rejected realm registration: {other:?}")
            }
            other => bail!("unexpected uplink reply during registration: {other:?}"),
        }

        Ok(Self {
            stream: Mutex::new(stream),
        })
    }

    /// Asks the login service whether `username` holds a live session,
    /// and for everything the realm needs to take it over.
    pub async fn player_login(&self, username: &str) -> Result<PlayerLoginReply> {
        let mut stream = self.stream.lock().await;
        write_frame(
            &mut stream,
            &RealmToLogin::PlayerLogin {
                username: username.to_string(),
            },
        )
        .await?;

        loop {
            match read_frame::<LoginToRealm>(&mut stream).await? {
                LoginToRealm::PlayerLoginSuccess {
                    username,
                    account,
                    session_key,
                    verifier,
                    salt,
                    tutorial,
                } => {
                    return Ok(PlayerLoginReply {
                        account,
                        username,
                        session_key,
                        verifier,
                        salt,
                        tutorial,
                    })
                }
                LoginToRealm::PlayerLoginFailure { username } => {
                    return Err(anyhow!("login service has no current session for {username}"))
                }
                // a keep-alive answer racing ahead of ours
                LoginToRealm::KeepAlive => continue,
                other => return Err(anyhow!("unexpected uplink reply to player login: {other:?}")),
            }
        }
    }

    /// Tells the login service `account` left this realm.
    pub async fn player_logout(&self, account: AccountId) -> Result<()> {
        let mut stream = self.stream.lock().await;
        write_frame(&mut stream, &RealmToLogin::PlayerLogout { account }).await
    }

    /// Writes an account's tutorial bitfield back at session end.
    pub async fn tutorial_data(&self, account: AccountId, data: [u32; 8]) -> Result<()> {
        let mut stream = self.stream.lock().await;
        write_frame(&mut stream, &RealmToLogin::TutorialData { account, data }).await
    }

    /// Reports the realm's population for the realm list.
    pub async fn update_current_players(&self, players: u32, capacity: u32) -> Result<()> {
        let mut stream = self.stream.lock().await;
        write_frame(
            &mut stream,
            &RealmToLogin::UpdateCurrentPlayers { players, capacity },
        )
        .await
    }

    async fn keep_alive(&self) -> Result<()> {
        let mut stream = self.stream.lock().await;
        write_frame(&mut stream, &RealmToLogin::KeepAlive).await?;
        match read_frame::<LoginToRealm>(&mut stream).await? {
            LoginToRealm::KeepAlive => Ok(()),
            // a player-login answer can slide in between; the waiting
            // caller holds the lock next and will read it
            other => Err(anyhow!("unexpected keep-alive reply: {other:?}")),
        }
    }

    /// Pings the uplink forever so the login side's idle window never
    /// fires while the realm is healthy. Exits once the uplink is dead.
    pub async fn run_keep_alive(self: Arc<Self>) {
        loop {
            task::sleep(KEEP_ALIVE_INTERVAL).await;
            if let Err(e) = self.keep_alive().await {
                warn!("login uplink keep-alive failed: {e}");
                return;
            }
        }
    }
}

async fn read_frame<T: serde::de::DeserializeOwned>(stream: &mut TcpStream) -> Result<T> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    wow_bincode()
        .deserialize(&buf)
        .map_err(|e| anyhow!("malformed uplink frame: {e}"))
}

async fn write_frame<T: serde::Serialize>(stream: &mut TcpStream, value: &T) -> Result<()> {
    let body = wow_bincode().serialize(value)?;
    stream.write_all(&(body.len() as u32).to_le_bytes()).await?;
    stream.write_all(&body).await?;
    Ok(())
}
