//! Conversion of Telegram messages into transport-neutral inbound events.

use {
    pincer_channels::{InboundEvent, MediaKind, MessageContent},
    teloxide::types::{MediaKind as TgMediaKind, Message, MessageKind, User, UserId},
};

/// Extract the message body. Media keeps its caption; anything without a
/// textual part is `Unsupported`.
pub fn extract_content(msg: &Message) -> MessageContent {
    let MessageKind::Common(common) = &msg.kind else {
        return MessageContent::Unsupported;
    };
    let (media, caption) = match &common.media_kind {
        TgMediaKind::Text(t) => return MessageContent::text(t.text.clone()),
        TgMediaKind::Photo(p) => (MediaKind::Photo, p.caption.clone()),
        TgMediaKind::Video(v) => (MediaKind::Video, v.caption.clone()),
        TgMediaKind::Document(d) => (MediaKind::Document, d.caption.clone()),
        TgMediaKind::Audio(a) => (MediaKind::Audio, a.caption.clone()),
        TgMediaKind::Voice(v) => (MediaKind::Voice, v.caption.clone()),
        TgMediaKind::Animation(a) => (MediaKind::Animation, a.caption.clone()),
        _ => return MessageContent::Unsupported,
    };
    MessageContent::Media { media, caption }
}

/// "First Last", falling back to the username.
pub fn sender_name(user: &User) -> Option<String> {
    let last = user.last_name.as_deref().unwrap_or("");
    let name = format!("{} {last}", user.first_name).trim().to_string();
    if name.is_empty() {
        user.username.clone()
    } else {
        Some(name)
    }
}

/// Build the inbound event for `msg`. `bot_id` marks messages the bot sent
/// itself.
pub fn to_event(msg: &Message, bot_id: Option<UserId>) -> InboundEvent {
    let from = msg.from.as_ref();
    InboundEvent {
        id: msg.id.0.to_string(),
        conversation_id: msg.chat.id.0.to_string(),
        sender_id: from.map(|u| u.id.0.to_string()).unwrap_or_default(),
        sender_name: from.and_then(sender_name),
        content: extract_content(msg),
        sent_at: msg.date,
        is_self: matches!((from, bot_id), (Some(u), Some(bot)) if u.id == bot),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn message(extra: serde_json::Value) -> Message {
        let mut base = json!({
            "message_id": 7,
            "date": 1_700_000_000,
            "chat": { "id": -1001, "type": "group", "title": "Ops" },
            "from": {
                "id": 1001,
                "is_bot": false,
                "first_name": "Alice",
                "last_name": "Smith",
                "username": "alice"
            }
        });
        for (k, v) in extra.as_object().unwrap() {
            base[k] = v.clone();
        }
        serde_json::from_value(base).expect("deserialize message")
    }

    #[test]
    fn text_message_becomes_event() {
        let msg = message(json!({ "text": "@Pincer hello" }));
        let event = to_event(&msg, Some(UserId(9)));

        assert_eq!(event.id, "7");
        assert_eq!(event.conversation_id, "-1001");
        assert_eq!(event.sender_id, "1001");
        assert_eq!(event.sender_name.as_deref(), Some("Alice Smith"));
        assert_eq!(event.content, MessageContent::text("@Pincer hello"));
        assert_eq!(event.sent_at.timestamp(), 1_700_000_000);
        assert!(!event.is_self);
    }

    #[test]
    fn photo_keeps_caption() {
        let msg = message(json!({
            "photo": [{
                "file_id": "p1",
                "file_unique_id": "u1",
                "width": 10,
                "height": 10
            }],
            "caption": "look at this"
        }));
        assert_eq!(extract_content(&msg), MessageContent::Media {
            media: MediaKind::Photo,
            caption: Some("look at this".into()),
        });
        assert_eq!(extract_content(&msg).as_text(), Some("look at this"));
    }

    #[test]
    fn location_is_unsupported() {
        let msg = message(json!({
            "location": { "latitude": 48.8566, "longitude": 2.3522 }
        }));
        assert_eq!(extract_content(&msg), MessageContent::Unsupported);
    }

    #[test]
    fn own_message_is_flagged() {
        let msg = message(json!({ "text": "*Pincer:* hi" }));
        assert!(to_event(&msg, Some(UserId(1001))).is_self);
        assert!(!to_event(&msg, None).is_self);
    }

    #[test]
    fn sender_name_falls_back_to_username() {
        let msg = message(json!({
            "text": "hi",
            "from": { "id": 5, "is_bot": false, "first_name": "", "username": "anon" }
        }));
        assert_eq!(to_event(&msg, None).sender_name.as_deref(), Some("anon"));
    }
}
