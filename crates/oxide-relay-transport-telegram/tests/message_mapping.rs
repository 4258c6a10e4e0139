use oxide_relay_core::transport::{ChatKind, MessageRef};
use oxide_relay_transport_telegram::bot::handlers::source_from_message;
use teloxide::types::Message;

fn parse(json: &str) -> Message {
    serde_json::from_str(json).unwrap_or_else(|e| panic!("fixture should parse: {e}"))
}

#[test]
fn private_text_message_maps_to_direct_chat() {
    let msg = parse(
        r#"{
            "message_id": 11,
            "date": 1700000000,
            "chat": {"id": 5001, "type": "private", "first_name": "Jane"},
            "from": {"id": 5001, "is_bot": false, "first_name": "Jane"},
            "text": "https://www.instagram.com/p/abc/?igsh=xyz"
        }"#,
    );

    let source = source_from_message(&msg).unwrap_or_else(|| panic!("text message"));
    assert_eq!(source.chat_kind, ChatKind::Direct);
    assert_eq!(source.chat_id, 5001);
    assert_eq!(source.message, MessageRef(11));
    assert!(source.text.starts_with("https://www.instagram.com/p/abc/"));
}

#[test]
fn supergroup_caption_is_used_as_text() {
    let msg = parse(
        r#"{
            "message_id": 12,
            "date": 1700000000,
            "chat": {"id": -1001234, "type": "supergroup", "title": "Friends"},
            "from": {"id": 5001, "is_bot": false, "first_name": "Jane"},
            "photo": [{"file_id": "f", "file_unique_id": "u", "width": 10, "height": 10}],
            "caption": "look https://x.com/u/status/1"
        }"#,
    );

    let source = source_from_message(&msg).unwrap_or_else(|| panic!("caption message"));
    assert_eq!(source.chat_kind, ChatKind::Group);
    assert_eq!(source.text, "look https://x.com/u/status/1");
}

#[test]
fn channel_post_maps_to_channel() {
    let msg = parse(
        r#"{
            "message_id": 13,
            "date": 1700000000,
            "chat": {"id": -1009999, "type": "channel", "title": "News"},
            "text": "https://example.com/p/1"
        }"#,
    );

    let source = source_from_message(&msg).unwrap_or_else(|| panic!("channel post"));
    assert_eq!(source.chat_kind, ChatKind::Channel);
}

#[test]
fn message_without_text_is_ignored() {
    let msg = parse(
        r#"{
            "message_id": 14,
            "date": 1700000000,
            "chat": {"id": 5001, "type": "private", "first_name": "Jane"},
            "from": {"id": 5001, "is_bot": false, "first_name": "Jane"},
            "photo": [{"file_id": "f", "file_unique_id": "u", "width": 10, "height": 10}]
        }"#,
    );

    assert!(source_from_message(&msg).is_none());
}
