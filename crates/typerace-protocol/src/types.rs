//! Core protocol types for Typerace's wire format.
//!
//! Every message is a flat JSON object whose `type` field names the
//! variant. Field names follow the browser client (`channelID`,
//! `currentIndex`, ...) rather than Rust conventions, hence the explicit
//! `#[serde(rename)]` attributes.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A server-generated, opaque identifier for a player.
///
/// `#[serde(transparent)]` keeps it a plain JSON string on the wire.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The name of a room, as chosen by clients (`channelID`).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// The room used when a client joins with an empty `channelID`.
    pub const DEFAULT: &'static str = "default";

    /// Maps a client-supplied channel id to a room id. An empty channel
    /// id selects the shared [`DEFAULT`](Self::DEFAULT) room.
    pub fn from_channel(channel_id: &str) -> Self {
        if channel_id.is_empty() {
            Self(Self::DEFAULT.to_string())
        } else {
            Self(channel_id.to_string())
        }
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// PlayerSnapshot
// ---------------------------------------------------------------------------

/// One player's public progress, as carried in `players` arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub username: String,
    #[serde(rename = "currentIndex")]
    pub current_index: u32,
    #[serde(rename = "mistakeCount")]
    pub mistake_count: u32,
}

// ---------------------------------------------------------------------------
// ClientMessage: browser → server
// ---------------------------------------------------------------------------

/// Messages a client sends to the server.
///
/// `#[serde(tag = "type")]` gives the internally tagged shape
/// `{ "type": "JoinRoom", "channelID": "abc", ... }`. Absent fields take
/// their zero value. Any `type` the server does not know decodes to
/// [`ClientMessage::Unknown`] instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// "Put me in this room under this name." Must be the first message.
    JoinRoom {
        #[serde(rename = "channelID", default)]
        channel_id: String,
        #[serde(default)]
        username: String,
    },

    /// "Start the race." Any member may send it.
    StartGame,

    /// "This is how far I got." Trusted as reported.
    ProgressUpdate {
        #[serde(rename = "currentIndex", default)]
        current_index: u32,
        #[serde(rename = "mistakeCount", default)]
        mistake_count: u32,
    },

    /// "I typed the whole sentence."
    GameFinished,

    /// Any other `type` value. Ignored by the server.
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// ServerMessage: server → browser
// ---------------------------------------------------------------------------

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Unicast to a player right after they join.
    Joined {
        #[serde(rename = "playerID")]
        player_id: PlayerId,
        #[serde(rename = "targetSentence")]
        target_sentence: String,
        players: Vec<PlayerSnapshot>,
    },

    /// Room-wide: someone joined, here is the new roster.
    PlayerJoined { players: Vec<PlayerSnapshot> },

    /// Room-wide: the race is on.
    GameStarted {
        #[serde(rename = "targetSentence")]
        target_sentence: String,
    },

    /// Room-wide: progress changed or someone left.
    PlayerProgress { players: Vec<PlayerSnapshot> },

    /// Room-wide: the first finisher's display name.
    GameFinished { winner: String },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The browser client parses these exact JSON shapes, so the tests
    //! pin field names rather than round-tripping.

    use super::*;

    fn pid(id: &str) -> PlayerId {
        PlayerId(id.to_string())
    }

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&pid("ab12")).unwrap();
        assert_eq!(json, "\"ab12\"");
    }

    #[test]
    fn test_room_id_from_empty_channel_is_default() {
        assert_eq!(RoomId::from_channel("").as_str(), "default");
        assert_eq!(RoomId::from_channel("abc").as_str(), "abc");
    }

    #[test]
    fn test_join_room_decodes_wire_field_names() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"JoinRoom","channelID":"abc","username":"Alice"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                channel_id: "abc".into(),
                username: "Alice".into(),
            }
        );
    }

    #[test]
    fn test_join_room_missing_fields_default_to_empty() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"JoinRoom"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                channel_id: String::new(),
                username: String::new(),
            }
        );
    }

    #[test]
    fn test_progress_update_missing_counts_default_to_zero() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"ProgressUpdate","currentIndex":7}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::ProgressUpdate {
                current_index: 7,
                mistake_count: 0,
            }
        );
    }

    #[test]
    fn test_unit_variants_decode_from_bare_type() {
        let start: ClientMessage =
            serde_json::from_str(r#"{"type":"StartGame"}"#).unwrap();
        assert_eq!(start, ClientMessage::StartGame);

        let done: ClientMessage =
            serde_json::from_str(r#"{"type":"GameFinished"}"#).unwrap();
        assert_eq!(done, ClientMessage::GameFinished);
    }

    #[test]
    fn test_unknown_type_decodes_to_unknown() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"Chat","text":"hi"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn test_missing_type_is_an_error() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"currentIndex":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_index_is_an_error() {
        let result: Result<ClientMessage, _> = serde_json::from_str(
            r#"{"type":"ProgressUpdate","currentIndex":-1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_joined_json_format() {
        let msg = ServerMessage::Joined {
            player_id: pid("p1"),
            target_sentence: "Clean code matters".into(),
            players: vec![PlayerSnapshot {
                id: pid("p1"),
                username: "Alice".into(),
                current_index: 0,
                mistake_count: 0,
            }],
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Joined");
        assert_eq!(json["playerID"], "p1");
        assert_eq!(json["targetSentence"], "Clean code matters");
        assert_eq!(json["players"][0]["id"], "p1");
        assert_eq!(json["players"][0]["username"], "Alice");
        assert_eq!(json["players"][0]["currentIndex"], 0);
        assert_eq!(json["players"][0]["mistakeCount"], 0);
    }

    #[test]
    fn test_game_started_json_format() {
        let msg = ServerMessage::GameStarted {
            target_sentence: "Golang is fast".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "GameStarted");
        assert_eq!(json["targetSentence"], "Golang is fast");
    }

    #[test]
    fn test_player_progress_json_format() {
        let msg = ServerMessage::PlayerProgress {
            players: vec![PlayerSnapshot {
                id: pid("p2"),
                username: "Bob".into(),
                current_index: 5,
                mistake_count: 1,
            }],
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "PlayerProgress");
        assert_eq!(json["players"][0]["currentIndex"], 5);
        assert_eq!(json["players"][0]["mistakeCount"], 1);
    }

    #[test]
    fn test_player_joined_with_empty_roster() {
        let json =
            serde_json::to_value(&ServerMessage::PlayerJoined { players: vec![] })
                .unwrap();
        assert_eq!(json, serde_json::json!({"type": "PlayerJoined", "players": []}));
    }
}
