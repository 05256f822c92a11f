//! opcodes
//!
//! The wire-level command and status codes shared by the login and realm
//! protocols.

use aegis_game::accounts::LoginFailure;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

/// The login-protocol command codes.
#[repr(u8)]
#[derive(TryFromPrimitive, IntoPrimitive, Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(into = "u8")]
pub enum AuthCommand {
    ConnectRequest = 0x00,
    AuthLogonProof = 0x01,
    AuthReconnectChallenge = 0x02,
    AuthReconnectProof = 0x03,
    RealmList = 0x10,
    TransferInitiate = 0x30,
    TransferData = 0x31,
    TransferAccept = 0x32,
    TransferResume = 0x33,
    TransferCancel = 0x34,
}

/// The login-protocol return/status codes.
#[repr(u8)]
#[derive(Serialize, IntoPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(into = "u8")]
pub enum ReturnCode {
    Success = 0x00,
    Failed = 0x01,
    Failed2 = 0x02,
    Banned = 0x03,
    UnknownAccount = 0x04,
    IncorrectPassword = 0x05,
    AlreadyOnline = 0x06,
    NoTime = 0x07,
    DbBusy = 0x08,
    VersionInvalid = 0x09,
    VersionUpdate = 0x0A,
    InvalidServer = 0x0B,
    Suspended = 0x0C,
    NoAccess = 0x0D,
    SuccessSurvey = 0x0E,
    ParentControl = 0x0F,
    LockedEnforced = 0x10,
    Disconnected = 0xFF,
}

impl From<LoginFailure> for ReturnCode {
    fn from(f: LoginFailure) -> Self {
        match f {
            LoginFailure::Suspended => ReturnCode::Suspended,
            LoginFailure::Banned => ReturnCode::Banned,
            LoginFailure::UnknownAccount => ReturnCode::UnknownAccount,
            LoginFailure::IncorrectPassword => ReturnCode::IncorrectPassword,
            LoginFailure::NoCachedSession => ReturnCode::Failed,
            LoginFailure::DatabaseError => ReturnCode::Failed,
        }
    }
}

/// The realm-protocol opcodes, sent once a client has authenticated
/// against a realm. Client-originated opcodes the realm doesn't list
/// here are forwarded opaquely to the bound world node.
#[repr(u16)]
#[derive(TryFromPrimitive, IntoPrimitive, Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(into = "u16")]
pub enum RealmCommand {
    AuthChallenge = 0x1EC,
    AuthSession = 0x1ED,
    AuthResponse = 0x1EE,

    CharCreate = 0x36,
    CharEnum = 0x37,
    CharDelete = 0x38,
    CharRename = 0x10A,
    PlayerLogin = 0x3D,

    NewWorld = 0x3E,
    TransferPending = 0x3F,
    TransferAborted = 0x40,
    CharLoginFailed = 0x41,
    LoginSetTimeSpeed = 0x42,

    LogoutRequest = 0x4A,
    LogoutResponse = 0x4C,
    LogoutComplete = 0x4D,

    NameQuery = 0x50,
    NameQueryResponse = 0x51,

    Who = 0x62,
    WhoResponse = 0x63,

    FriendList = 0x66,
    FriendListResponse = 0x67,
    FriendStatus = 0x68,
    AddFriend = 0x69,
    DelFriend = 0x6A,
    AddIgnore = 0x6C,
    DelIgnore = 0x6D,

    GroupInvite = 0x6E,
    GroupInviteReceived = 0x6F,
    GroupAccept = 0x72,
    GroupDecline = 0x73,
    GroupDeclineInform = 0x74,
    GroupUninvite = 0x75,
    GroupSetLeader = 0x78,
    GroupSetLeaderInform = 0x79,
    LootMethod = 0x7A,
    GroupDisband = 0x7B,
    GroupDestroyed = 0x7C,
    GroupList = 0x7D,
    PartyCommandResult = 0x7F,
    GroupAssistant = 0x28F,

    MessageChat = 0x95,
    ChatDelivered = 0x96,

    MoveWorldPortAck = 0xDC,

    TutorialFlags = 0xFD,
    TutorialFlag = 0xFE,
    TutorialClear = 0xFF,
    TutorialReset = 0x100,

    TriggerCinematic = 0xFA,
    InitializeFactions = 0x122,
    SetActionButton = 0x128,
    ActionButtons = 0x129,
    InitialSpells = 0x12A,
    BindPointUpdate = 0x155,

    KeepAlive = 0x1DC,
    Ping = 0x1DD,
    Pong = 0x1DE,
    CompressedUpdateObject = 0x1F6,

    AccountDataTimes = 0x209,
    SetRestStart = 0x21E,
    LoginVerifyWorld = 0x236,
    MailListResult = 0x23B,
    InitWorldStates = 0x2C2,

    ChatWrongFaction = 0x2A6,
    ChatPlayerNotFound = 0x2A9,

    AddonInfo = 0x2EF,
    SetDungeonDifficulty = 0x329,
    Motd = 0x33D,
    RealmSplit = 0x38B,
    TimeSyncRequest = 0x390,
    TimeSyncResponse = 0x391,
    FeatureSystemStatus = 0x3C9,

    ClientCacheVersion = 0x4AF,
    ReadyForAccountDataTimes = 0x4FF,
}

/// Response codes for char-select operations and world entry.
#[repr(u8)]
#[derive(Serialize, IntoPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(into = "u8")]
pub enum ResponseCode {
    Success = 0x00,
    Failure = 0x01,
    NameInUse = 0x02,
    Disabled = 0x03,
    LoginDisabled = 0x04,
    CharCreateError = 0x05,
    /// The realm refuses any further characters, regardless of account.
    CharCreateServerLimit = 0x06,
    /// The account is at its character cap on this realm.
    CharCreateAccountLimit = 0x07,
    CharCreateInvalidRaceClass = 0x08,
    CharDeleteFailed = 0x09,
    CharLoginInProgress = 0x0A,
    CharLoginNoWorld = 0x0B,
    CharLoginNoCharacter = 0x0C,
    CharLoginRenamePending = 0x0D,
}

/// The expansion level reported in `AuthResponse`.
#[repr(u8)]
#[derive(Serialize, IntoPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(into = "u8")]
pub enum Expansion {
    Classic = 0x00,
    BurningCrusade = 0x01,
}
