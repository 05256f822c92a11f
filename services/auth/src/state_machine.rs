//! state_machine
//!
//! The login session typestate: `New → ChallengeSent → ProofValidated →
//! RealmListServed`, with a parallel `ReconnectChallengeSent →
//! ReconnectProofValidated` branch reachable from `New`. A second
//! handshake attempt from either branch, or a `RealmList` request before
//! `ProofValidated`/`ReconnectProofValidated`, is a protocol violation
//! the type system rejects at compile time rather than a runtime check.

use aegis_game::accounts::{AccountId, AccountService, LoginFailure};
use aegis_protocol::login::{ConnectProof, ConnectProofResponse, ReconnectProof};
use aegis_protocol::opcodes::ReturnCode;
use aegis_srp::Challenge;
use rand::Rng;
use tracing::{event, Level};

pub struct New;

pub struct ChallengeSent {
    account: AccountId,
    challenge: Challenge,
}

pub struct ProofValidated {
    account: AccountId,
    session_key: [u8; 40],
    salt: [u8; 32],
    verifier: [u8; 32],
}

pub struct RealmListServed {
    account: AccountId,
}

pub struct ReconnectChallengeSent {
    username: String,
    server_challenge: [u8; 16],
}

pub struct ReconnectProofValidated {
    username: String,
}

/// Why a connection was closed, carried only for logging; the canonical
/// wire code is derived from it at the point a reply is actually sent.
pub enum CloseReason {
    VersionInvalid,
    Login(LoginFailure),
    ProtocolViolation,
    RateLimited,
}

impl From<&CloseReason> for ReturnCode {
    fn from(reason: &CloseReason) -> Self {
        match reason {
            CloseReason::VersionInvalid => ReturnCode::VersionInvalid,
            CloseReason::Login(f) => (*f).into(),
            CloseReason::ProtocolViolation | CloseReason::RateLimited => ReturnCode::Failed,
        }
    }
}

pub struct Closed {
    pub reason: CloseReason,
}

pub struct Machine<S> {
    state: S,
}

impl Machine<Closed> {
    pub fn reason(&self) -> &CloseReason {
        &self.state.reason
    }
}

/// The build this service accepts; anything else gets `VersionInvalid`.
pub const SUPPORTED_BUILD: u16 = 8606;

impl Default for Machine<New> {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine<New> {
    pub fn new() -> Self {
        Machine { state: New }
    }

    /// Begins a fresh login: validates the client build, loads the
    /// account's cached `(s, v)` and opens a challenge against it.
    pub async fn begin_login(
        self,
        build: u16,
        username: &str,
        accounts: &dyn AccountService,
    ) -> Result<(Machine<ChallengeSent>, Challenge), Machine<Closed>> {
        event!(Level::DEBUG, %username, "login challenge requested");

        if build != SUPPORTED_BUILD {
            return Err(Machine {
                state: Closed {
                    reason: CloseReason::VersionInvalid,
                },
            });
        }

        let login_challenge = accounts.initiate_login(username).await.map_err(|e| Machine {
            state: Closed {
                reason: CloseReason::Login(e),
            },
        })?;

        Ok((
            Machine {
                state: ChallengeSent {
                    account: login_challenge.account,
                    challenge: login_challenge.challenge.clone(),
                },
            },
            login_challenge.challenge,
        ))
    }

    /// Begins a reconnect: draws a fresh 16-byte server challenge. The
    /// account's cached session key is checked lazily, when the proof
    /// comes back, so an unknown username doesn't distinguish itself
    /// from a wrong password at this stage either.
    pub fn begin_reconnect(self, username: &str) -> Machine<ReconnectChallengeSent> {
        event!(Level::DEBUG, %username, "reconnect challenge requested");
        let server_challenge: [u8; 16] = rand::thread_rng().gen();
        Machine {
            state: ReconnectChallengeSent {
                username: username.to_string(),
                server_challenge,
            },
        }
    }
}

impl Machine<ChallengeSent> {
    pub async fn submit_proof(
        self,
        proof: &ConnectProof,
        accounts: &dyn AccountService,
    ) -> Result<(Machine<ProofValidated>, ConnectProofResponse), Machine<Closed>> {
        let account = self.state.account;
        let salt = self.state.challenge.salt().0;
        let verifier = self.state.challenge.verifier().0;
        let login_challenge = aegis_game::accounts::LoginChallenge {
            account,
            challenge: self.state.challenge,
            security_flags: 0,
        };

        let result = accounts
            .complete_login(login_challenge, &proof.a_pub, &proof.client_m)
            .await
            .map_err(|e| Machine {
                state: Closed {
                    reason: CloseReason::Login(e),
                },
            })?;

        Ok((
            Machine {
                state: ProofValidated {
                    account,
                    session_key: result.session_key,
                    salt,
                    verifier,
                },
            },
            ConnectProofResponse {
                result: ReturnCode::Success,
                server_proof: result.server_proof,
                account_flags: 0,
                survey_id: 0,
                unk_flags: 0,
            },
        ))
    }
}

impl Machine<ProofValidated> {
    pub fn account(&self) -> AccountId {
        self.state.account
    }

    pub fn session_key(&self) -> [u8; 40] {
        self.state.session_key
    }

    pub fn salt(&self) -> [u8; 32] {
        self.state.salt
    }

    pub fn verifier(&self) -> [u8; 32] {
        self.state.verifier
    }

    pub fn serve_realm_list(self) -> Machine<RealmListServed> {
        Machine {
            state: RealmListServed {
                account: self.state.account,
            },
        }
    }
}

impl Machine<RealmListServed> {
    pub fn account(&self) -> AccountId {
        self.state.account
    }
}

impl Machine<ReconnectChallengeSent> {
    pub fn server_challenge(&self) -> [u8; 16] {
        self.state.server_challenge
    }

    pub async fn submit_proof(
        self,
        proof: &ReconnectProof,
        accounts: &dyn AccountService,
    ) -> Result<Machine<ReconnectProofValidated>, Machine<Closed>> {
        accounts
            .complete_reconnect(
                &self.state.username,
                &proof.client_challenge,
                &self.state.server_challenge,
                &proof.client_response,
            )
            .await
            .map_err(|e| Machine {
                state: Closed {
                    reason: CloseReason::Login(e),
                },
            })?;

        Ok(Machine {
            state: ReconnectProofValidated {
                username: self.state.username,
            },
        })
    }
}

impl Machine<ReconnectProofValidated> {
    pub fn username(&self) -> &str {
        &self.state.username
    }

    /// Reconnect has no cached [`AccountId`] of its own (only the
    /// username survives the proof check), so the caller supplies it
    /// after a lookup of its own.
    pub fn serve_realm_list(self, account: AccountId) -> Machine<RealmListServed> {
        Machine {
            state: RealmListServed { account },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn close_reason_maps_to_canonical_return_code() {
        assert_eq!(
            ReturnCode::from(&CloseReason::Login(LoginFailure::Banned)),
            ReturnCode::Banned
        );
        assert_eq!(
            ReturnCode::from(&CloseReason::VersionInvalid),
            ReturnCode::VersionInvalid
        );
    }
}
