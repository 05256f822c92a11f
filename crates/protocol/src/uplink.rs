//! uplink
//!
//! The login↔realm side channel: a realm registers itself on startup,
//! then uses the connection for per-player session-key lookups, player
//! counts, tutorial-data writebacks and keep-alives. Framed on the wire
//! as a `u32` length prefix followed by a `wow_bincode`-encoded value.

use aegis_game::{accounts::AccountId, realms::RealmId};
use serde::{Deserialize, Serialize};

/// Carried in [`RealmLogin`]; a mismatch refuses the registration before
/// anything else is read.
pub const UPLINK_PROTOCOL_VERSION: u32 = 0x0005;

/// A realm registering itself with the login service. The password proof
/// is `SHA1(shared_secret)`; both ends hold the same realm-registry row,
/// so the secret itself never crosses the wire. The visible name, host
/// and port are what the login service then advertises in its realm list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealmLogin {
    pub protocol_version: u32,
    pub realm_id: RealmId,
    pub internal_name: String,
    pub password_proof: [u8; 20],
    pub visible_name: String,
    pub host: String,
    pub port: u16,
}

/// The login service's verdict on a [`RealmLogin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RealmLoginResult {
    Success,
    UnknownRealm,
    WrongPassword,
    AlreadyOnline,
    /// The realm list is full; its count is a single `u8` on the wire.
    ServerFull,
    UnsupportedVersion,
}

/// Everything a realm can send up the login↔realm uplink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RealmToLogin {
    Login(RealmLogin),
    /// The realm's current population, reflected into the realm list.
    UpdateCurrentPlayers { players: u32, capacity: u32 },
    /// A client presented this username's session key to the realm; only
    /// the login service can say whether that key is current.
    PlayerLogin { username: String },
    PlayerLogout { account: AccountId },
    KeepAlive,
    /// Tutorial progress written back when a realm session ends.
    TutorialData { account: AccountId, data: [u32; 8] },
}

/// The login service's replies on the same channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoginToRealm {
    LoginResult(RealmLoginResult),
    /// The account's live session: the SRP session key plus the cached
    /// `(v, s)` pair and tutorial data the realm needs to take over.
    PlayerLoginSuccess {
        username: String,
        account: AccountId,
        session_key: [u8; 40],
        verifier: [u8; 32],
        salt: [u8; 32],
        tutorial: [u32; 8],
    },
    PlayerLoginFailure { username: String },
    KeepAlive,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wow_bincode;
    use bincode::Options;

    #[test]
    fn player_login_success_round_trips() {
        let reply = LoginToRealm::PlayerLoginSuccess {
            username: "ALICE".into(),
            account: AccountId(7),
            session_key: [9u8; 40],
            verifier: [1u8; 32],
            salt: [2u8; 32],
            tutorial: [0, 1, 2, 3, 4, 5, 6, 7],
        };

        let bytes = wow_bincode().serialize(&reply).unwrap();
        let decoded: LoginToRealm = wow_bincode().deserialize(&bytes).unwrap();
        match decoded {
            LoginToRealm::PlayerLoginSuccess {
                username,
                account,
                session_key,
                verifier,
                salt,
                tutorial,
            } => {
                assert_eq!(username, "ALICE");
                assert_eq!(account, AccountId(7));
                assert_eq!(session_key, [9u8; 40]);
                assert_eq!(verifier, [1u8; 32]);
                assert_eq!(salt, [2u8; 32]);
                assert_eq!(tutorial, [0, 1, 2, 3, 4, 5, 6, 7]);
            }
            other => panic!("decoded to the wrong variant: {other:?}"),
        }
    }

    #[test]
    fn realm_login_round_trips() {
        let login = RealmToLogin::Login(RealmLogin {
            protocol_version: UPLINK_PROTOCOL_VERSION,
            realm_id: RealmId(3),
            internal_name: "aegis-eu-1".into(),
            password_proof: [0xAB; 20],
            visible_name: "Aegis EU".into(),
            host: "play.example.org".into(),
            port: 8085,
        });

        let bytes = wow_bincode().serialize(&login).unwrap();
        let decoded: RealmToLogin = wow_bincode().deserialize(&bytes).unwrap();
        match decoded {
            RealmToLogin::Login(l) => {
                assert_eq!(l.protocol_version, UPLINK_PROTOCOL_VERSION);
                assert_eq!(l.visible_name, "Aegis EU");
                assert_eq!(l.port, 8085);
            }
            other => panic!("decoded to the wrong variant: {other:?}"),
        }
    }
}
