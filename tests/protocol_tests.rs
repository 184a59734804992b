#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol serialization tests for the Salad Bowl client.
//!
//! Verifies round-trip serialization of every protocol type, including all
//! `ClientMessage` and `ServerMessage` variants, the camelCase wire field
//! names the game server expects, integer phase codes, and the three-way
//! [`decode`] result for unknown and malformed input.

use saladbowl_client::protocol::{
    decode, encode, BowlPatch, ClientMessage, Decoded, GameConfig, GamePhase, PlayerInfo,
    ServerMessage, Team, WordPatch,
};

// ════════════════════════════════════════════════════════════════════
// Helper
// ════════════════════════════════════════════════════════════════════

/// Serialize `val` to JSON, then deserialize back to `T` and return it.
fn round_trip<T: serde::Serialize + serde::de::DeserializeOwned>(val: &T) -> T {
    let json = serde_json::to_string(val).expect("serialize");
    serde_json::from_str(&json).expect("deserialize")
}

fn sample_player() -> PlayerInfo {
    PlayerInfo {
        id: 7,
        name: "Alice".into(),
        team: Some(Team::Blue),
        is_owner: true,
        ready: false,
    }
}

// ════════════════════════════════════════════════════════════════════
// ClientMessage round-trip tests (6 variants)
// ════════════════════════════════════════════════════════════════════

#[test]
fn client_message_client_hello_round_trip() {
    let msg = ClientMessage::ClientHello {
        name: "Alice".into(),
        token: Some("tok-123".into()),
    };
    let deser = round_trip(&msg);
    assert_eq!(deser, msg);
}

#[test]
fn client_message_client_hello_without_token_omits_field() {
    let msg = ClientMessage::ClientHello {
        name: "Alice".into(),
        token: None,
    };
    let json = serde_json::to_string(&msg).expect("serialize");
    assert!(
        !json.contains("token"),
        "unset token must be omitted from the wire, got {json}"
    );
    let deser: ClientMessage = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(deser, msg);
}

#[test]
fn client_message_update_player_info_round_trip() {
    let msg = ClientMessage::UpdatePlayerInfo {
        name: "Alice".into(),
        team: Team::Red,
    };
    let deser = round_trip(&msg);
    assert_eq!(deser, msg);
}

#[test]
fn client_message_start_game_round_trip() {
    let msg = ClientMessage::StartGame;
    let json = serde_json::to_string(&msg).expect("serialize");
    let deser: ClientMessage = serde_json::from_str(&json).expect("deserialize");
    assert!(matches!(deser, ClientMessage::StartGame));
}

#[test]
fn client_message_update_game_config_uses_camel_case_keys() {
    let msg = ClientMessage::UpdateGameConfig(
        GameConfig::new()
            .with_max_words(20)
            .with_suggestion_time(120)
            .with_guessing_time(45)
            .with_rounds(5),
    );
    let json = serde_json::to_string(&msg).expect("serialize");
    assert!(json.contains(r#""maxWords":20"#), "got {json}");
    assert!(json.contains(r#""suggestionTime":120"#), "got {json}");
    assert!(json.contains(r#""guessingTime":45"#), "got {json}");
    assert!(json.contains(r#""rounds":5"#), "got {json}");
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn client_message_word_suggestions_round_trip() {
    let msg = ClientMessage::WordSuggestions {
        words: vec!["apple".into(), "banana".into(), "cherry".into()],
    };
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn client_message_word_success_round_trip() {
    let msg = ClientMessage::WordSuccess {
        token: "ack-42".into(),
    };
    assert_eq!(round_trip(&msg), msg);
}

// ════════════════════════════════════════════════════════════════════
// ServerMessage round-trip tests (5 variants)
// ════════════════════════════════════════════════════════════════════

#[test]
fn server_message_server_hello_round_trip() {
    let msg = ServerMessage::ServerHello {
        player_id: 7,
        token: "t1".into(),
    };
    let json = serde_json::to_string(&msg).expect("serialize");
    // The wire uses the server's `playerID` spelling.
    assert!(json.contains(r#""playerID":7"#), "got {json}");
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn server_message_player_list_round_trip() {
    let msg = ServerMessage::PlayerList {
        players: vec![
            sample_player(),
            PlayerInfo {
                id: 8,
                name: "Bob".into(),
                team: None,
                is_owner: false,
                ready: true,
            },
        ],
    };
    let json = serde_json::to_string(&msg).expect("serialize");
    assert!(json.contains(r#""isOwner":true"#), "got {json}");
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn server_message_game_status_round_trip() {
    let msg = ServerMessage::GameStatus {
        phase: GamePhase::Suggestion,
    };
    let json = serde_json::to_string(&msg).expect("serialize");
    // Phases travel as integer codes.
    assert!(json.contains(r#""phase":1"#), "got {json}");
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn server_message_word_new_round_trip() {
    let msg = ServerMessage::WordNew(WordPatch {
        word: Some("apple".into()),
        time_left: Some(30),
        token: Some("ack1".into()),
    });
    let json = serde_json::to_string(&msg).expect("serialize");
    assert!(json.contains(r#""timeLeft":30"#), "got {json}");
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn server_message_bowl_update_round_trip() {
    let msg = ServerMessage::BowlUpdate(BowlPatch {
        current: Some(3),
        total: Some(10),
    });
    assert_eq!(round_trip(&msg), msg);
}

// ════════════════════════════════════════════════════════════════════
// Wire fixtures (raw JSON the server actually sends)
// ════════════════════════════════════════════════════════════════════

#[test]
fn fixture_server_hello() {
    let json = r#"{"type":"ServerHello","data":{"playerID":7,"token":"abc"}}"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize fixture");
    assert_eq!(
        msg,
        ServerMessage::ServerHello {
            player_id: 7,
            token: "abc".into(),
        }
    );
}

#[test]
fn fixture_player_list_with_unset_team() {
    let json = concat!(
        r#"{"type":"PlayerList","data":{"players":["#,
        r#"{"id":1,"name":"Alice","team":"blue","isOwner":true,"ready":true},"#,
        r#"{"id":2,"name":"Bob","isOwner":false,"ready":false}"#,
        r#"]}}"#,
    );
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize fixture");
    if let ServerMessage::PlayerList { players } = msg {
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].team, Some(Team::Blue));
        // A player who has not picked a team yet simply omits the field.
        assert_eq!(players[1].team, None);
    } else {
        panic!("expected PlayerList");
    }
}

#[test]
fn fixture_partial_word_new() {
    let json = r#"{"type":"WordNew","data":{"timeLeft":12}}"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize fixture");
    assert_eq!(
        msg,
        ServerMessage::WordNew(WordPatch {
            word: None,
            time_left: Some(12),
            token: None,
        })
    );
}

#[test]
fn fixture_partial_bowl_update() {
    let json = r#"{"type":"BowlUpdate","data":{"current":4}}"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize fixture");
    assert_eq!(
        msg,
        ServerMessage::BowlUpdate(BowlPatch {
            current: Some(4),
            total: None,
        })
    );
}

// ════════════════════════════════════════════════════════════════════
// GamePhase code mapping
// ════════════════════════════════════════════════════════════════════

#[test]
fn game_phase_codes_map_totally() {
    assert_eq!(GamePhase::from(0), GamePhase::Lobby);
    assert_eq!(GamePhase::from(1), GamePhase::Suggestion);
    assert_eq!(GamePhase::from(2), GamePhase::Playing);
    // Anything else is Unknown, never an error.
    assert_eq!(GamePhase::from(3), GamePhase::Unknown);
    assert_eq!(GamePhase::from(u32::MAX), GamePhase::Unknown);
}

#[test]
fn game_phase_decodes_unrecognized_code_without_error() {
    let json = r#"{"type":"GameStatus","data":{"phase":99}}"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("unknown code must still decode");
    assert_eq!(
        msg,
        ServerMessage::GameStatus {
            phase: GamePhase::Unknown
        }
    );
}

// ════════════════════════════════════════════════════════════════════
// decode(): the three-way result
// ════════════════════════════════════════════════════════════════════

#[test]
fn decode_recognized_message() {
    let result = decode(r#"{"type":"ServerHello","data":{"playerID":1,"token":"t"}}"#);
    assert!(
        matches!(result, Decoded::Message(ServerMessage::ServerHello { .. })),
        "got {result:?}"
    );
}

#[test]
fn decode_unknown_kind_is_not_an_error() {
    let result = decode(r#"{"type":"ConfettiBlast","data":{"intensity":11}}"#);
    if let Decoded::Unknown { kind } = result {
        assert_eq!(kind, "ConfettiBlast");
    } else {
        panic!("expected Unknown, got {result:?}");
    }
}

#[test]
fn decode_invalid_json_is_malformed() {
    let result = decode("{{{{not json");
    assert!(matches!(result, Decoded::Malformed { .. }), "got {result:?}");
}

#[test]
fn decode_missing_tag_is_malformed() {
    let result = decode(r#"{"data":{"playerID":1}}"#);
    assert!(matches!(result, Decoded::Malformed { .. }), "got {result:?}");
}

#[test]
fn decode_non_string_tag_is_malformed() {
    let result = decode(r#"{"type":42,"data":{}}"#);
    assert!(matches!(result, Decoded::Malformed { .. }), "got {result:?}");
}

#[test]
fn decode_wrong_field_types_is_malformed() {
    // A recognized kind with a structurally invalid payload is malformed,
    // not unknown.
    let result = decode(r#"{"type":"ServerHello","data":{"playerID":"seven","token":"t"}}"#);
    assert!(matches!(result, Decoded::Malformed { .. }), "got {result:?}");
}

#[test]
fn decode_missing_required_field_is_malformed() {
    let result = decode(r#"{"type":"ServerHello","data":{"playerID":7}}"#);
    assert!(matches!(result, Decoded::Malformed { .. }), "got {result:?}");
}

// ════════════════════════════════════════════════════════════════════
// encode()
// ════════════════════════════════════════════════════════════════════

#[test]
fn encode_produces_adjacently_tagged_envelope() {
    let json = encode(&ClientMessage::StartGame).expect("encode");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
    assert_eq!(value.get("type").and_then(|t| t.as_str()), Some("StartGame"));
}

#[test]
fn encode_decode_is_inverse_for_hello() {
    let json = encode(&ClientMessage::ClientHello {
        name: "Alice".into(),
        token: Some("t".into()),
    })
    .expect("encode");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
    assert_eq!(
        value.pointer("/data/name").and_then(|v| v.as_str()),
        Some("Alice")
    );
}

// ════════════════════════════════════════════════════════════════════
// GameConfig defaults
// ════════════════════════════════════════════════════════════════════

#[test]
fn game_config_defaults_match_the_lobby() {
    let config = GameConfig::default();
    assert_eq!(config.max_words, 15);
    assert_eq!(config.suggestion_time, 180);
    assert_eq!(config.guessing_time, 30);
    assert_eq!(config.rounds, 3);
}

#[test]
fn team_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Team::Blue).unwrap(), r#""blue""#);
    assert_eq!(serde_json::to_string(&Team::Red).unwrap(), r#""red""#);
}
