//! sessions
//!
//! The process-local session registry: one entry per account, created
//! when an SRP proof checks out and replaced whenever the same account
//! starts a new handshake. The realm uplink answers its `PlayerLogin`
//! lookups from here, so a realm can only admit a client whose session
//! key this process actually negotiated.

use std::{collections::HashMap, time::Instant};

use aegis_game::{accounts::AccountId, realms::RealmId};
use async_std::sync::RwLock;
use tracing::debug;

/// A live authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub account: AccountId,
    pub username: String,
    pub session_key: [u8; 40],
    pub verifier: [u8; 32],
    pub salt: [u8; 32],
    pub started: Instant,
    /// Set once a realm reports this account connected to it.
    pub entered_realm: Option<RealmId>,
}

/// All live sessions, indexed by account and by uppercase username.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_account: RwLock<HashMap<AccountId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a session for `account`, replacing any previous one: an
    /// account holds at most one authenticated session at a time.
    pub async fn insert(&self, session: Session) {
        let mut sessions = self.by_account.write().await;
        if let Some(old) = sessions.insert(session.account, session) {
            debug!(account = %old.account, "session replaced by a new login");
        }
    }

    pub async fn get(&self, account: AccountId) -> Option<Session> {
        self.by_account.read().await.get(&account).cloned()
    }

    pub async fn get_by_username(&self, username: &str) -> Option<Session> {
        let username = username.to_ascii_uppercase();
        self.by_account
            .read()
            .await
            .values()
            .find(|s| s.username == username)
            .cloned()
    }

    /// Records which realm the account ended up on.
    pub async fn set_entered_realm(&self, account: AccountId, realm: RealmId) {
        if let Some(session) = self.by_account.write().await.get_mut(&account) {
            session.entered_realm = Some(realm);
        }
    }

    /// Clears the entered-realm marker once a realm reports the account
    /// logged out of it.
    pub async fn clear_entered_realm(&self, account: AccountId) {
        if let Some(session) = self.by_account.write().await.get_mut(&account) {
            session.entered_realm = None;
        }
    }

    pub async fn remove(&self, account: AccountId) -> Option<Session> {
        self.by_account.write().await.remove(&account)
    }

    pub async fn count(&self) -> usize {
        self.by_account.read().await.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn session(account: u32, username: &str) -> Session {
        Session {
            account: AccountId(account),
            username: username.to_string(),
            session_key: [account as u8; 40],
            verifier: [0u8; 32],
            salt: [0u8; 32],
            started: Instant::now(),
            entered_realm: None,
        }
    }

    #[async_std::test]
    async fn one_session_per_account() {
        let registry = SessionRegistry::new();
        registry.insert(session(1, "ALICE")).await;
        registry.insert(session(1, "ALICE")).await;
        assert_eq!(registry.count().await, 1);
    }

    #[async_std::test]
    async fn lookup_by_username_is_case_insensitive() {
        let registry = SessionRegistry::new();
        registry.insert(session(1, "ALICE")).await;
        let found = registry.get_by_username("alice").await.unwrap();
        assert_eq!(found.account, AccountId(1));
    }

    #[async_std::test]
    async fn entered_realm_is_recorded() {
        let registry = SessionRegistry::new();
        registry.insert(session(1, "ALICE")).await;
        registry.set_entered_realm(AccountId(1), RealmId(4)).await;
        assert_eq!(
            registry.get(AccountId(1)).await.unwrap().entered_realm,
            Some(RealmId(4))
        );
    }
}
