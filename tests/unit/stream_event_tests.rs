//! Unit tests for parsing agent CLI `stream-json` lines.

use serde_json::json;

use agent_hitl::stream::event::{parse_line, StreamEvent, UNRECOGNIZED_PREFIX};
use agent_hitl::AppError;

#[test]
fn empty_line_yields_no_events() {
    assert!(parse_line("").unwrap().is_empty());
    assert!(parse_line("   \t").unwrap().is_empty());
}

#[test]
fn assistant_blocks_map_one_event_each_in_order() {
    let line = json!({
        "type": "assistant",
        "message": {
            "role": "assistant",
            "content": [
                {"type": "thinking", "thinking": "let me see", "signature": "abc"},
                {"type": "text", "text": "Hello"},
                {"type": "tool_use", "id": "tu_1", "name": "Read", "input": {"path": "a.txt"}}
            ]
        }
    })
    .to_string();

    let events = parse_line(&line).unwrap();

    assert_eq!(
        events,
        vec![
            StreamEvent::Thinking {
                thinking: "let me see".into(),
                signature: "abc".into(),
            },
            StreamEvent::Text {
                text: "Hello".into(),
            },
            StreamEvent::ToolUse {
                id: "tu_1".into(),
                name: "Read".into(),
                input: json!({"path": "a.txt"}),
            },
        ]
    );
}

#[test]
fn assistant_plain_string_content_is_text() {
    let events = parse_line(r#"{"type":"assistant","message":{"content":"hi"}}"#).unwrap();
    assert_eq!(events, vec![StreamEvent::Text { text: "hi".into() }]);
}

#[test]
fn user_line_keeps_tool_results_and_drops_echo_text() {
    let line = json!({
        "type": "user",
        "message": {
            "content": [
                {"type": "text", "text": "my own prompt"},
                {"type": "tool_result", "tool_use_id": "tu_1", "content": "file body"},
                {"type": "tool_result", "tool_use_id": "tu_2", "content": [{"type": "text", "text": "x"}], "is_error": true}
            ]
        }
    })
    .to_string();

    let events = parse_line(&line).unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        StreamEvent::ToolResult {
            tool_use_id: "tu_1".into(),
            content: json!("file body"),
            is_error: false,
        }
    );
    assert!(matches!(events[1], StreamEvent::ToolResult { is_error: true, .. }));
}

#[test]
fn user_plain_text_line_yields_nothing() {
    let events = parse_line(r#"{"type":"user","message":{"content":"echo"}}"#).unwrap();
    assert!(events.is_empty());
}

#[test]
fn system_line_carries_whole_payload() {
    let line = r#"{"type":"system","subtype":"init","model":"m","tools":["Read"]}"#;

    let events = parse_line(line).unwrap();

    match &events[..] {
        [StreamEvent::System { subtype, data }] => {
            assert_eq!(subtype, "init");
            assert_eq!(data["model"], "m");
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[test]
fn system_line_without_subtype_is_unknown() {
    let events = parse_line(r#"{"type":"system"}"#).unwrap();
    assert!(matches!(&events[0], StreamEvent::System { subtype, .. } if subtype == "unknown"));
}

#[test]
fn result_line_is_terminal() {
    let line = r#"{"type":"result","subtype":"success","is_error":false,"result":"done","num_turns":3}"#;

    let events = parse_line(line).unwrap();

    assert_eq!(
        events,
        vec![StreamEvent::Result {
            subtype: "success".into(),
            is_error: false,
            result: Some("done".into()),
        }]
    );
    assert!(events[0].is_terminal());
}

#[test]
fn unknown_line_type_is_kept_as_system_event() {
    let events = parse_line(r#"{"type":"stream_event","event":{"delta":"x"}}"#).unwrap();

    match &events[..] {
        [StreamEvent::System { subtype, data }] => {
            assert_eq!(subtype, &format!("{UNRECOGNIZED_PREFIX}stream_event"));
            assert_eq!(data["event"]["delta"], "x");
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[test]
fn unknown_block_type_is_kept_as_system_event() {
    let line = json!({
        "type": "assistant",
        "message": {"content": [
            {"type": "redacted_thinking", "data": "opaque"},
            {"type": "text", "text": "after"}
        ]}
    })
    .to_string();

    let events = parse_line(&line).unwrap();

    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        StreamEvent::System { subtype, .. } if subtype == "unrecognized:redacted_thinking"
    ));
    assert_eq!(
        events[1],
        StreamEvent::Text {
            text: "after".into(),
        }
    );
}

#[test]
fn malformed_json_is_a_transport_error() {
    let err = parse_line("{not json").unwrap_err();
    assert!(
        matches!(err, AppError::Transport(ref msg) if msg.starts_with("malformed json")),
        "got {err:?}"
    );
}

#[test]
fn missing_type_is_a_transport_error() {
    let err = parse_line(r#"{"message":{}}"#).unwrap_err();
    assert!(matches!(err, AppError::Transport(_)));
}

#[test]
fn known_block_missing_field_is_a_transport_error() {
    let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Read"}]}}"#;

    let err = parse_line(line).unwrap_err();

    assert!(
        matches!(err, AppError::Transport(ref msg) if msg.starts_with("missing required field")),
        "got {err:?}"
    );
}
