//! uplink
//!
//! The login side of the realm↔login channel. A realm registers itself
//! on startup by proving it knows the shared secret from its registry
//! row; after that the connection carries per-player session-key
//! lookups, population updates, tutorial-data writebacks and 30-second
//! keep-alives. An uplink idle past the keep-alive window is dropped and
//! its realm marked offline.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use aegis_game::{
    accounts::AccountService,
    realms::{RealmId, RealmList},
};
use aegis_protocol::{
    login::MAX_REALMS,
    uplink::{LoginToRealm, RealmLogin, RealmLoginResult, RealmToLogin, UPLINK_PROTOCOL_VERSION},
    wow_bincode,
};
use anyhow::{anyhow, Result};
use async_std::{
    future::timeout,
    io::{ReadExt, WriteExt},
    net::{TcpListener, TcpStream},
    prelude::*,
    task,
};
use bincode::Options;
use sha1::{Digest, Sha1};
use tracing::{debug, info, instrument, warn};

use crate::LoginServices;

/// An uplink with no frame for this long is presumed dead.
const KEEP_ALIVE_WINDOW: Duration = Duration::from_secs(30);

/// Listens for realm-server connections and services the uplink protocol
/// for as long as each stays connected.
#[instrument(skip(services))]
pub async fn start<A, R>(
    bind: SocketAddr,
    services: Arc<LoginServices<A, R>>,
) -> Result<()>
where
    A: AccountService + Send + Sync + 'static,
    R: RealmList + Send + Sync + 'static,
{
    let listener = TcpListener::bind(bind).await?;
    debug!(%bind, "listening for realm uplink connections");

    let mut incoming = listener.incoming();
    while let Some(stream) = incoming.next().await {
        let stream = stream?;
        let services = services.clone();
        task::spawn(async move {
            if let Err(e) = handle_realm(stream, &services).await {
                warn!("realm uplink connection ended: {e}");
            }
        });
    }

    Ok(())
}

async fn handle_realm<A, R>(
    mut stream: TcpStream,
    services: &LoginServices<A, R>,
) -> Result<()>
where
    A: AccountService + Send + Sync,
    R: RealmList + Send + Sync,
{
    let mut registered: Option<RealmId> = None;

    let outcome = serve_frames(&mut stream, services, &mut registered).await;

    if let Some(id) = registered {
        if let Err(e) = services.realms.set_offline(id).await {
            warn!(%id, "failed to mark realm offline: {e}");
        }
    }

    outcome
}

async fn serve_frames<A, R>(
    stream: &mut TcpStream,
    services: &LoginServices<A, R>,
    registered: &mut Option<RealmId>,
) -> Result<()>
where
    A: AccountService + Send + Sync,
    R: RealmList + Send + Sync,
{
    loop {
        let request = match timeout(KEEP_ALIVE_WINDOW, read_frame::<RealmToLogin>(stream)).await
        {
            Ok(Ok(Some(r))) => r,
            Ok(Ok(None)) => return Ok(()),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(?registered, "realm uplink idle past the keep-alive window");
                return Ok(());
            }
        };

        match request {
            RealmToLogin::Login(login) => {
                let result = register_realm(&login, services).await;
                write_frame(stream, &LoginToRealm::LoginResult(result)).await?;
                match result {
                    RealmLoginResult::Success => *registered = Some(login.realm_id),
                    // a refused realm gets its answer, nothing more
                    _ => return Ok(()),
                }
            }
            RealmToLogin::PlayerLogin { username } => {
                let reply = answer_player_login(&username, services, *registered).await;
                write_frame(stream, &reply).await?;
            }
            RealmToLogin::PlayerLogout { account } => {
                services.sessions.clear_entered_realm(account).await;
            }
            RealmToLogin::UpdateCurrentPlayers { players, capacity } => {
                if let Some(id) = *registered {
                    let population = if capacity == 0 {
                        0.0
                    } else {
                        players as f32 / capacity as f32
                    };
                    services.realms.set_population(id, population).await.ok();
                }
            }
            RealmToLogin::TutorialData { account, data } => {
                if let Err(e) = services.accounts.set_tutorial_data(account, data).await {
                    warn!(%account, "failed to write back tutorial data: {e}");
                }
            }
            RealmToLogin::KeepAlive => {
                write_frame(stream, &LoginToRealm::KeepAlive).await?;
            }
        }
    }
}

async fn register_realm<A, R>(
    login: &RealmLogin,
    services: &LoginServices<A, R>,
) -> RealmLoginResult
where
    A: AccountService + Send + Sync,
    R: RealmList + Send + Sync,
{
    if login.protocol_version != UPLINK_PROTOCOL_VERSION {
        return RealmLoginResult::UnsupportedVersion;
    }

    let realm = match services.realms.get_by_internal_name(&login.internal_name).await {
        Ok(r) => r,
        Err(_) => return RealmLoginResult::UnknownRealm,
    };
    if realm.id != login.realm_id || expected_proof(&realm.shared_secret) != login.password_proof
    {
        return RealmLoginResult::WrongPassword;
    }
    if realm.is_online() {
        return RealmLoginResult::AlreadyOnline;
    }

    // the realm list carries a u8 count; refuse what it can't report
    let online = services
        .realms
        .realms()
        .await
        .iter()
        .filter(|r| r.is_online())
        .count();
    if online >= MAX_REALMS {
        return RealmLoginResult::ServerFull;
    }

    match services
        .realms
        .set_online(realm.id, &login.visible_name, &login.host, login.port)
        .await
    {
        Ok(()) => {
            info!(realm = %realm.id, name = %login.visible_name, "realm registered");
            RealmLoginResult::Success
        }
        Err(e) => {
            warn!(realm = %realm.id, "failed to mark realm online: {e}");
            RealmLoginResult::UnknownRealm
        }
    }
}

/// Answers a realm's session-key lookup from the live session registry.
/// The registry, not the store's cached key, is what decides whether a
/// session is current; a key left over from an older process is not a
/// session.
async fn answer_player_login<A, R>(
    username: &str,
    services: &LoginServices<A, R>,
    realm: Option<RealmId>,
) -> LoginToRealm
where
    A: AccountService + Send + Sync,
    R: RealmList + Send + Sync,
{
    // only a registered realm gets to ask about sessions
    if realm.is_none() {
        warn!(%username, "player login lookup from an unregistered uplink");
        return LoginToRealm::PlayerLoginFailure {
            username: username.to_string(),
        };
    }

    let session = match services.sessions.get_by_username(username).await {
        Some(s) => s,
        None => {
            debug!(%username, "player login lookup missed the session registry");
            return LoginToRealm::PlayerLoginFailure {
                username: username.to_string(),
            };
        }
    };

    let tutorial = services
        .accounts
        .tutorial_data(session.account)
        .await
        .unwrap_or_default();

    if let Some(realm) = realm {
        services.sessions.set_entered_realm(session.account, realm).await;
    }

    LoginToRealm::PlayerLoginSuccess {
        username: session.username.clone(),
        account: session.account,
        session_key: session.session_key,
        verifier: session.verifier,
        salt: session.salt,
        tutorial,
    }
}

/// The proof a realm presents to authenticate itself: `SHA1(secret)`. A
/// realm and the login service both hold the same realm-registry row, so
/// neither ever sends the secret itself over the wire.
fn expected_proof(shared_secret: &[u8; 32]) -> [u8; 20] {
    Sha1::digest(shared_secret).into()
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
            .map_err(|e| anyhow!("malformed uplink frame: {e}"))?,
    ))
}

async fn write_frame<T: serde::Serialize>(stream: &mut TcpStream, value: &T) -> Result<()> {
    let body = wow_bincode().serialize(value)?;
    stream.write_all(&(body.len() as u32).to_le_bytes()).await?;
    stream.write_all(&body).await?;
    Ok(())
}
