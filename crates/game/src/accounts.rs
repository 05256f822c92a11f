//! accounts
//!
//! Account creation, login verification and ban state.

use aegis_srp::{Challenge, Proof, Salt, Verifier};
use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// An id for an account.
#[derive(Debug, Display, PartialEq, Eq, Type, Clone, Copy, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct AccountId(pub u32);

/// A basic account object.
#[derive(Debug, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub salt: Salt,
    pub verifier: Verifier,
    pub ban_status: Option<BanStatus>,
    pub session_key: Option<[u8; 40]>,
}

/// Models the status of someone's ban.
#[derive(PartialEq, Eq, Debug, Type, Clone, Copy)]
#[repr(u8)]
pub enum BanStatus {
    Temporary,
    Permanent,
}

/// A login in progress: wraps a fresh [`Challenge`], handed back to the
/// caller by [`AccountService::initiate_login`] so the second half of the
/// handshake can be verified without another store round-trip.
#[derive(Debug, Clone, Copy)]
pub struct LoginChallenge {
    pub account: AccountId,
    pub challenge: Challenge,
    pub security_flags: u8,
}

/// An account service handles all the business logic for accounts: store
/// access plus the login/reconnect handshake orchestration that needs the
/// cached `(salt, verifier)` pair to even begin.
#[async_trait]
pub trait AccountService {
    /// Creates a new account in the system from a cleartext password. The
    /// store only ever sees the derived `(salt, verifier)` pair.
    async fn create_account(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<AccountId, AccountOpError>;

    /// Deletes an account from the system along with all associated
    /// information and characters.
    async fn delete_account(&self, id: AccountId) -> Result<(), AccountOpError>;

    /// Gets an account from the system by its username.
    async fn get_account(&self, username: &str) -> Result<Account, AccountOpError>;

    /// Begins a fresh login: loads the cached `(salt, verifier)` pair if
    /// present, otherwise derives one from the stored password hash and
    /// caches it. The cached pair is never recomputed on a later login,
    /// or reconnect proofs against the old verifier would stop matching.
    async fn initiate_login(&self, username: &str) -> Result<LoginChallenge, LoginFailure>;

    /// Verifies the client's proof against an in-progress challenge and,
    /// on success, persists the resulting session key.
    async fn complete_login(
        &self,
        challenge: LoginChallenge,
        a_pub: &[u8; 32],
        client_m: &[u8; 20],
    ) -> Result<Proof, LoginFailure>;

    /// Verifies a reconnect proof against the account's cached session
    /// key, without requiring a full challenge/proof round trip.
    async fn complete_reconnect(
        &self,
        username: &str,
        client_challenge: &[u8; 16],
        reconnect_proof: &[u8; 16],
        client_response: &[u8; 20],
    ) -> Result<(), LoginFailure>;

    /// The account's tutorial-progress bitfield, all zeroes if never set.
    async fn tutorial_data(&self, id: AccountId) -> Result<[u32; 8], AccountOpError>;

    /// Writes the tutorial bitfield back, as reported by a realm over the
    /// uplink when a session ends.
    async fn set_tutorial_data(&self, id: AccountId, data: [u32; 8])
        -> Result<(), AccountOpError>;
}

/// Errors that may occur when running account operations.
#[derive(Error, Debug, Display)]
pub enum AccountOpError {
    UsernameTooLong,
    PasswordTooLong,
    UsernameTaken,
    PersistError(String),
    InvalidAccount(AccountId),
}

/// Errors that may occur when logging in.
#[derive(Copy, Clone, Debug, Error, Display)]
pub enum LoginFailure {
    Suspended,
    Banned,
    UnknownAccount,
    IncorrectPassword,
    NoCachedSession,
    DatabaseError,
}
