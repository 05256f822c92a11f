//! state_machine
//!
//! The realm session's status gate: which client packets are admissible
//! in which phase of the connection. Unlike the login session FSM this
//! isn't a typestate (the realm holds one long-lived connection that
//! moves through these phases while also fielding `Always`-class packets
//! like `Ping`/`KeepAlive` regardless of phase), so it's modeled as a
//! plain enum plus a dispatch-table function instead.

use aegis_protocol::realm::ClientPacket;
use aegis_utils::PacketParseResult;

/// Where a realm-authenticated connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Socket open, `AuthChallenge` sent, waiting for `CMSG_AUTH_SESSION`.
    Connected,
    /// Session key verified; at the character-select screen.
    Authenticated,
    /// In the world; traffic the realm doesn't recognize is proxied to
    /// the bound world node.
    LoggedIn,
    /// A placement on a world node is in flight (first entry or a map
    /// transfer); only the transfer ack and `Always`-class packets are
    /// admitted.
    TransferPending,
}

/// Whether `packet` may be handled while the session is in `status`.
pub fn admits(status: SessionStatus, packet: &ClientPacket) -> bool {
    use SessionStatus::*;

    match packet {
        // admitted in every phase
        ClientPacket::KeepAlive | ClientPacket::Ping { .. } => true,

        ClientPacket::AuthSession(_) => status == Connected,

        // character screen
        ClientPacket::ReadyForAccountDataTimes
        | ClientPacket::CharEnum
        | ClientPacket::CharCreate(_)
        | ClientPacket::CharDelete(_)
        | ClientPacket::CharRename { .. }
        | ClientPacket::RealmSplit { .. }
        | ClientPacket::PlayerLogin(_) => status == Authenticated,

        // in the world
        ClientPacket::NameQuery(_)
        | ClientPacket::Who(_)
        | ClientPacket::MessageChat(_)
        | ClientPacket::TutorialFlag(_)
        | ClientPacket::TutorialClear
        | ClientPacket::TutorialReset
        | ClientPacket::SetActionButton { .. }
        | ClientPacket::FriendList
        | ClientPacket::AddFriend { .. }
        | ClientPacket::DelFriend(_)
        | ClientPacket::AddIgnore { .. }
        | ClientPacket::DelIgnore(_)
        | ClientPacket::GroupInvite { .. }
        | ClientPacket::GroupAccept
        | ClientPacket::GroupDecline
        | ClientPacket::GroupUninvite { .. }
        | ClientPacket::GroupSetLeader(_)
        | ClientPacket::GroupAssistant { .. }
        | ClientPacket::LootMethod { .. }
        | ClientPacket::GroupDisband
        | ClientPacket::TimeSyncResponse { .. } => status == LoggedIn,

        ClientPacket::LogoutRequest => matches!(status, Authenticated | LoggedIn),

        // the client confirms a map hand-off with the port ack
        ClientPacket::MoveWorldPortAck => status == TransferPending,
    }
}

/// Applies the status gate as the outcome the session loop acts on: a
/// mismatched packet is dropped, except for the security-critical repeat
/// handshake, which tears the connection down.
pub fn gate(status: SessionStatus, packet: &ClientPacket) -> PacketParseResult {
    if admits(status, packet) {
        PacketParseResult::Pass
    } else if matches!(packet, ClientPacket::AuthSession(_)) {
        PacketParseResult::Disconnect
    } else {
        PacketParseResult::Block
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn auth_session_only_admitted_before_authentication() {
        let packet = ClientPacket::AuthSession(aegis_protocol::realm::AuthSession {
            build: 0,
            username: String::new(),
            local_challenge: [0; 4],
            client_proof: [0; 20],
            addons: Vec::new(),
        });
        assert!(admits(SessionStatus::Connected, &packet));
        assert!(!admits(SessionStatus::Authenticated, &packet));
        assert!(!admits(SessionStatus::LoggedIn, &packet));
    }

    #[test]
    fn ping_admitted_in_every_phase() {
        let packet = ClientPacket::Ping { seq: 1, latency: 0 };
        for status in [
            SessionStatus::Connected,
            SessionStatus::Authenticated,
            SessionStatus::LoggedIn,
            SessionStatus::TransferPending,
        ] {
            assert!(admits(status, &packet));
        }
    }

    #[test]
    fn char_enum_requires_authenticated_status() {
        assert!(!admits(SessionStatus::Connected, &ClientPacket::CharEnum));
        assert!(admits(SessionStatus::Authenticated, &ClientPacket::CharEnum));
        assert!(!admits(SessionStatus::LoggedIn, &ClientPacket::CharEnum));
    }

    #[test]
    fn chat_requires_a_world() {
        let packet = ClientPacket::MessageChat(aegis_protocol::realm::ChatMessageRequest {
            chat_type: aegis_protocol::realm::ChatType::Say,
            language: 0,
            recipient: None,
            channel: None,
            message: "hello".into(),
        });
        assert!(!admits(SessionStatus::Authenticated, &packet));
        assert!(admits(SessionStatus::LoggedIn, &packet));
        assert!(!admits(SessionStatus::TransferPending, &packet));
    }

    #[test]
    fn gate_closes_on_a_repeated_handshake_and_drops_the_rest() {
        let auth = ClientPacket::AuthSession(aegis_protocol::realm::AuthSession {
            build: 0,
            username: String::new(),
            local_challenge: [0; 4],
            client_proof: [0; 20],
            addons: Vec::new(),
        });
        assert_eq!(
            gate(SessionStatus::Authenticated, &auth),
            PacketParseResult::Disconnect
        );
        assert_eq!(
            gate(SessionStatus::LoggedIn, &ClientPacket::CharEnum),
            PacketParseResult::Block
        );
        assert_eq!(
            gate(SessionStatus::Authenticated, &ClientPacket::CharEnum),
            PacketParseResult::Pass
        );
    }

    #[test]
    fn port_ack_only_lands_mid_transfer() {
        assert!(admits(SessionStatus::TransferPending, &ClientPacket::MoveWorldPortAck));
        assert!(!admits(SessionStatus::LoggedIn, &ClientPacket::MoveWorldPortAck));
        assert!(!admits(SessionStatus::Authenticated, &ClientPacket::MoveWorldPortAck));
    }
}
