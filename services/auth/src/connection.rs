//! connection
//!
//! Drives one client socket through the login session typestate and, once
//! authenticated, answers rate-limited realm-list requests until the
//! connection closes, trips the limiter, or goes idle past the window.

use std::time::{Duration, Instant};

use aegis_game::{
    accounts::{AccountId, AccountService},
    realms::RealmList,
};
use aegis_protocol::{
    login::{ConnectChallenge, ConnectProofResponse, RealmListResponse, ReconnectChallenge},
    opcodes::{AuthCommand, ReturnCode},
};
use aegis_utils::RateWindow;
use anyhow::Result;
use async_std::{future::timeout, net::TcpStream};
use rand::Rng;
use tracing::{event, instrument, warn, Level};

use crate::{
    protocol::{read_message, send_reply, ClientMessage, ReadError},
    sessions::Session,
    state_machine::{CloseReason, Machine, New},
    LoginServices,
};

const REALM_LIST_RATE_LIMIT: usize = 3;
const REALM_LIST_RATE_WINDOW: Duration = Duration::from_secs(10);

/// A connection with no inbound packet for this long is torn down.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Either branch of the handshake, once past the proof stage: the realm
/// list is the only thing both have in common from here.
enum Authenticated {
    Fresh(Machine<crate::state_machine::ProofValidated>),
    Reconnected(Machine<crate::state_machine::ReconnectProofValidated>, AccountId),
}

async fn read_or_idle<R>(stream: &mut R) -> Result<Option<ClientMessage>, ReadError>
where
    R: async_std::io::Read + Unpin,
{
    timeout(IDLE_TIMEOUT, read_message(stream))
        .await
        .map_err(|_| ReadError::IdleTimeout)?
}

#[instrument(skip(stream, services))]
pub async fn handle_connection<A, R>(
    mut stream: TcpStream,
    services: &LoginServices<A, R>,
) -> Result<()>
where
    A: AccountService + Send + Sync,
    R: RealmList + Send + Sync,
{
    let authenticated = match perform_handshake(&mut stream, services).await? {
        Some(a) => a,
        None => return Ok(()),
    };

    let account = match &authenticated {
        Authenticated::Fresh(m) => m.account(),
        Authenticated::Reconnected(_, account) => *account,
    };

    let mut rate = RateWindow::new(REALM_LIST_RATE_LIMIT, REALM_LIST_RATE_WINDOW);

    loop {
        match read_or_idle(&mut stream).await {
            Ok(Some(ClientMessage::RealmList)) => {
                if !rate.check(Instant::now()) {
                    warn!(%account, "realm list rate limit exceeded, closing connection");
                    return Ok(());
                }

                let list: Vec<_> = services
                    .realms
                    .realms()
                    .await
                    .into_iter()
                    .filter(|r| r.is_online())
                    .collect();
                let response = RealmListResponse::from_realms(&list, |_| 0);
                send_reply(&mut stream, AuthCommand::RealmList, &response).await?;
            }
            Ok(Some(_)) => {
                warn!(%account, "protocol violation: unexpected message after authentication");
                return Ok(());
            }
            Ok(None) => return Ok(()),
            Err(ReadError::IdleTimeout) => {
                warn!(%account, "idle timeout, closing connection");
                return Ok(());
            }
            Err(e) => {
                warn!(%account, "read error, closing connection: {e}");
                return Ok(());
            }
        }
    }
}

async fn perform_handshake<A, R>(
    stream: &mut TcpStream,
    services: &LoginServices<A, R>,
) -> Result<Option<Authenticated>>
where
    A: AccountService + Send + Sync,
    R: RealmList + Send + Sync,
{
    let first = match read_or_idle(stream).await {
        Ok(Some(m)) => m,
        Ok(None) | Err(ReadError::IdleTimeout) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match first {
        ClientMessage::Connect { request, username } => {
            let locale = aegis_game::types::Locale::from_magic(request.locale);
            event!(Level::DEBUG, %username, ?locale, "logon challenge");

            let machine = Machine::<New>::new();
            let (challenge_machine, challenge) =
                match machine.begin_login(request.build, &username, &services.accounts).await {
                    Ok(v) => v,
                    Err(closed) => {
                        send_failure(stream, closed.reason()).await?;
                        return Ok(None);
                    }
                };

            let reply = ConnectChallenge {
                result: ReturnCode::Success,
                b_pub: *challenge.b_pub(),
                g_len: 1,
                g: challenge.g_bytes(),
                n_len: 32,
                n: challenge.n_bytes(),
                salt: challenge.salt().0,
                crc_salt: rand::thread_rng().gen(),
                security_flags: 0,
            };
            send_reply(stream, AuthCommand::ConnectRequest, &reply).await?;

            let proof = match read_or_idle(stream).await? {
                Some(ClientMessage::Proof(p)) => p,
                _ => {
                    warn!("protocol violation: expected logon proof");
                    return Ok(None);
                }
            };

            let (proof_machine, response) =
                match challenge_machine.submit_proof(&proof, &services.accounts).await {
                    Ok(v) => v,
                    Err(closed) => {
                        send_reply(
                            stream,
                            AuthCommand::AuthLogonProof,
                            &ConnectProofResponse {
                                result: closed.reason().into(),
                                server_proof: [0u8; 20],
                                account_flags: 0,
                                survey_id: 0,
                                unk_flags: 0,
                            },
                        )
                        .await?;
                        return Ok(None);
                    }
                };
            send_reply(stream, AuthCommand::AuthLogonProof, &response).await?;

            services
                .sessions
                .insert(Session {
                    account: proof_machine.account(),
                    username,
                    session_key: proof_machine.session_key(),
                    verifier: proof_machine.verifier(),
                    salt: proof_machine.salt(),
                    started: Instant::now(),
                    entered_realm: None,
                })
                .await;

            event!(Level::INFO, account = %proof_machine.account(), "login succeeded");
            Ok(Some(Authenticated::Fresh(proof_machine)))
        }
        ClientMessage::Reconnect { request, username } => {
            let machine = Machine::<New>::new();
            if request.build != crate::state_machine::SUPPORTED_BUILD {
                send_failure(stream, &CloseReason::VersionInvalid).await?;
                return Ok(None);
            }

            let reconnect_machine = machine.begin_reconnect(&username);
            let reply = ReconnectChallenge {
                result: ReturnCode::Success,
                challenge: reconnect_machine.server_challenge(),
                checksum_salt: rand::thread_rng().gen(),
            };
            send_reply(stream, AuthCommand::AuthReconnectChallenge, &reply).await?;

            let proof = match read_or_idle(stream).await? {
                Some(ClientMessage::ReconnectProof(p)) => p,
                _ => {
                    warn!("protocol violation: expected reconnect proof");
                    return Ok(None);
                }
            };

            let validated = match reconnect_machine.submit_proof(&proof, &services.accounts).await {
                Ok(v) => v,
                Err(closed) => {
                    send_reply(
                        stream,
                        AuthCommand::AuthReconnectProof,
                        &ReturnCode::from(closed.reason()),
                    )
                    .await?;
                    return Ok(None);
                }
            };
            send_reply(stream, AuthCommand::AuthReconnectProof, &ReturnCode::Success).await?;

            // reconnect proved possession of the cached key, so the
            // cached key becomes the live session again
            let account = match services.accounts.get_account(validated.username()).await {
                Ok(a) => a,
                Err(_) => return Ok(None),
            };
            let session_key = match account.session_key {
                Some(k) => k,
                None => return Ok(None),
            };
            services
                .sessions
                .insert(Session {
                    account: account.id,
                    username: account.username.clone(),
                    session_key,
                    verifier: account.verifier.0,
                    salt: account.salt.0,
                    started: Instant::now(),
                    entered_realm: None,
                })
                .await;

            event!(Level::INFO, account = %account.id, "reconnect succeeded");
            Ok(Some(Authenticated::Reconnected(validated, account.id)))
        }
        _ => {
            warn!("protocol violation: expected a challenge as the first message");
            Ok(None)
        }
    }
}

/// A refused challenge is byte-for-byte the same shape as an accepted
/// one, with random filler where SRP values would go, so neither the
/// length nor the layout of the response says whether the account exists.
async fn send_failure(stream: &mut TcpStream, reason: &CloseReason) -> Result<()> {
    let mut rng = rand::thread_rng();
    send_reply(
        stream,
        AuthCommand::ConnectRequest,
        &ConnectChallenge {
            result: reason.into(),
            b_pub: rng.gen(),
            g_len: 1,
            g: [7],
            n_len: 32,
            n: rng.gen(),
            salt: rng.gen(),
            crc_salt: rng.gen(),
            security_flags: 0,
        },
    )
    .await
}
