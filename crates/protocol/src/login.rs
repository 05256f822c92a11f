//! login
//!
//! Wire bodies for the login protocol: `ConnectRequest`/`ConnectChallenge`,
//! `ConnectProof`/`ConnectProofResponse`, the reconnect variants, and the
//! realm list response.

use aegis_game::realms::{RealmDescriptor, RealmFlags, RealmType};
use assert_size_attribute::assert_eq_size;
use serde::{Deserialize, Serialize};

use crate::opcodes::ReturnCode;

/// The fixed-size part of `CMD_AUTH_LOGON_CHALLENGE` / `CMD_AUTH_RECONNECT_
/// CHALLENGE`, after the leading opcode byte has been stripped. The
/// username trails this struct on the wire as `username_len` raw ASCII
/// bytes (not null-terminated, not a `wow_bincode` string); the caller
/// reads it separately once it knows the length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub error: u8,
    pub size: u16,
    pub game_name: [u8; 4],
    pub version_major: u8,
    pub version_minor: u8,
    pub version_patch: u8,
    pub build: u16,
    pub platform: [u8; 4],
    pub os: [u8; 4],
    pub locale: [u8; 4],
    pub timezone_bias: u32,
    pub ip: u32,
    pub username_len: u8,
}

/// The server's logon-challenge response. `security_flags` is always zero
/// in this implementation (no PIN/matrix-card/token second factor), so the
/// trailing conditional fields the real client supports are never
/// serialized. The group fields are fixed-size arrays so the response is
/// byte-for-byte the same length whether or not the account exists.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectChallenge {
    pub result: ReturnCode,
    pub b_pub: [u8; 32],
    pub g_len: u8,
    pub g: [u8; 1],
    pub n_len: u8,
    pub n: [u8; 32],
    pub salt: [u8; 32],
    pub crc_salt: [u8; 16],
    pub security_flags: u8,
}

/// `CMD_AUTH_LOGON_PROOF` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectProof {
    pub a_pub: [u8; 32],
    pub client_m: [u8; 20],
    pub crc_hash: [u8; 20],
    pub number_of_keys: u8,
    pub security_flags: u8,
}

/// `CMD_AUTH_LOGON_PROOF` response body.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectProofResponse {
    pub result: ReturnCode,
    pub server_proof: [u8; 20],
    pub account_flags: u32,
    pub survey_id: u32,
    pub unk_flags: u16,
}

/// `CMD_AUTH_RECONNECT_CHALLENGE` response body: a fresh 16-byte challenge
/// for the client to fold into its reconnect proof.
#[derive(Debug, Clone, Serialize)]
pub struct ReconnectChallenge {
    pub result: ReturnCode,
    pub challenge: [u8; 16],
    pub checksum_salt: [u8; 16],
}

/// `CMD_AUTH_RECONNECT_PROOF` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectProof {
    pub client_challenge: [u8; 16],
    pub client_response: [u8; 20],
    pub crc_hash: [u8; 20],
    pub key_count: u8,
}

/// `CMD_REALM_LIST` request body: empty but for a reserved `u32`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealmListRequest {
    pub reserved: u32,
}

/// A single realm entry within [`RealmListResponse`].
#[derive(Debug, Clone, Serialize)]
#[assert_eq_size([u8; 1])]
pub struct RealmFlagsByte(pub u8);

/// A single realm record as sent to the client.
#[derive(Debug, Clone, Serialize)]
pub struct RealmRecord {
    pub realm_type: RealmType,
    pub locked: u8,
    pub flags: RealmFlagsByte,
    pub name: String,
    pub address: String,
    pub population: f32,
    pub characters: u8,
    pub timezone: u8,
    pub id: u8,
}

impl RealmRecord {
    /// Builds a wire record from a stored realm descriptor and the
    /// connecting account's character count on that realm.
    pub fn from_descriptor(realm: &RealmDescriptor, characters: u8) -> Self {
        Self {
            realm_type: realm.realm_type,
            locked: 0,
            flags: RealmFlagsByte(realm.flags),
            name: realm.name.clone(),
            address: format!("{}:{}", realm.external_address, realm.port),
            population: realm.population,
            characters,
            timezone: realm.timezone,
            id: realm.id.0 as u8,
        }
    }

    /// Whether this realm is reported as offline to the client.
    pub fn is_offline(&self) -> bool {
        self.flags.0 & (RealmFlags::Offline as u8) != 0
    }
}

/// The full `CMD_REALM_LIST` response: a length-prefixed list of realms,
/// capped at 255 entries (a single `u8` count on the wire).
#[derive(Debug, Clone, Serialize)]
pub struct RealmListResponse {
    pub unknown: u32,
    pub num_realms: u8,
    pub realms: Vec<RealmRecord>,
    pub unknown2: u16,
}

/// The maximum number of realms a single response can report, imposed by
/// the `u8` count field on the wire.
pub const MAX_REALMS: usize = u8::MAX as usize;

impl RealmListResponse {
    /// Builds a response from the realms visible to `account_characters`
    /// (a lookup from realm id to the account's character count there),
    /// truncating to [`MAX_REALMS`] entries.
    pub fn from_realms(
        realms: &[RealmDescriptor],
        account_characters: impl Fn(&RealmDescriptor) -> u8,
    ) -> Self {
        let records: Vec<RealmRecord> = realms
            .iter()
            .take(MAX_REALMS)
            .map(|r| RealmRecord::from_descriptor(r, account_characters(r)))
            .collect();

        Self {
            unknown: 0,
            num_realms: records.len() as u8,
            realms: records,
            unknown2: 0,
        }
    }
}

/// Wraps a payload with the fixed `(opcode, size)` header every login
/// reply carries.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyPacket<T> {
    pub opcode: u8,
    pub body: T,
}

impl<T> ReplyPacket<T> {
    pub fn new(opcode: crate::opcodes::AuthCommand, body: T) -> Self {
        Self {
            opcode: opcode.into(),
            body,
        }
    }
}

#[cfg(test)]
mod test {
    use test_case::test_case;

    use super::*;
    use crate::wow_bincode;

    fn challenge(result: ReturnCode) -> ConnectChallenge {
        ConnectChallenge {
            result,
            b_pub: [1u8; 32],
            g_len: 1,
            g: [7],
            n_len: 32,
            n: [0u8; 32],
            salt: [2u8; 32],
            crc_salt: [3u8; 16],
            security_flags: 0,
        }
    }

    #[test_case(ReturnCode::Success, true; "success is accepted")]
    #[test_case(ReturnCode::UnknownAccount, false; "unknown account is a failure")]
    fn challenge_round_trips_through_wow_bincode(result: ReturnCode, success: bool) {
        let bytes = wow_bincode().serialize(&challenge(result)).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(matches!(result, ReturnCode::Success), success);
    }

    #[test]
    fn challenge_length_does_not_depend_on_the_result_code() {
        // an attacker must not be able to tell "unknown account" from
        // "known account" by the size of the response
        let success = wow_bincode().serialize(&challenge(ReturnCode::Success)).unwrap();
        for result in [
            ReturnCode::UnknownAccount,
            ReturnCode::Banned,
            ReturnCode::Suspended,
        ] {
            let failure = wow_bincode().serialize(&challenge(result)).unwrap();
            assert_eq!(success.len(), failure.len());
        }
    }

    #[test]
    fn realm_list_response_caps_at_max_realms() {
        let realms: Vec<RealmDescriptor> = (0..300)
            .map(|i| RealmDescriptor {
                id: aegis_game::realms::RealmId(i),
                internal_name: format!("internal-{i}"),
                name: format!("realm-{i}"),
                realm_type: RealmType::Normal,
                build: 12340,
                external_address: "127.0.0.1".into(),
                port: 8085,
                flags: 0,
                timezone: 0,
                population: 0.0,
                shared_secret: [0u8; 32],
            })
            .collect();

        let response = RealmListResponse::from_realms(&realms, |_| 0);
        assert_eq!(response.realms.len(), MAX_REALMS);
        assert_eq!(response.num_realms as usize, MAX_REALMS);
    }
}
