//! MEXC websocket protocol (`wss://wbs.mexc.com/ws`).
//!
//! Subscribes one channel at a time, waiting for each ack before sending
//! the next (spec.md §4.2). Data frames arrive as a binary
//! `PushDataV3ApiWrapper`: field 1 is the channel name, field 3 the symbol,
//! field 313 a nested depth submessage (repeated price/quantity pairs under
//! fields 1/2). Heartbeats are JSON text frames `{"ping":N}` requiring an
//! immediate `{"pong":N}` reply.

use tokio_tungstenite::tungstenite::Message;

use crate::feeds::json_decode::with_parsed;
use crate::feeds::mexc_proto::{find_field, walk_fields, Field};
use crate::feeds::session::{DecodedUpdate, VenueProtocol};
use crate::model::OrderBook;
use crate::venue::Venue;

const DEPTH_FIELD: u64 = 313;
const BID_TAG: u64 = 1;
const ASK_TAG: u64 = 2;
const PRICE_TAG: u64 = 1;
const QUANTITY_TAG: u64 = 2;

pub struct MexcProtocol;

impl VenueProtocol for MexcProtocol {
    fn venue(&self) -> Venue {
        Venue::Mexc
    }

    fn ws_url(&self) -> String {
        "wss://wbs.mexc.com/ws".to_string()
    }

    fn sequential_subscribe(&self) -> bool {
        true
    }

    fn subscription_messages(&self, symbols: &[String]) -> Vec<Message> {
        symbols
            .iter()
            .map(|s| {
                let channel = format!("spot@public.increase.depth.v3.api@{s}");
                let payload = serde_json::json!({
                    "method": "SUBSCRIPTION",
                    "params": [channel],
                });
                Message::Text(payload.to_string())
            })
            .collect()
    }

    fn decode(&self, msg: &Message) -> Vec<DecodedUpdate> {
        match msg {
            Message::Text(text) => decode_text_frame(text),
            Message::Binary(bytes) => decode_binary_frame(bytes),
            _ => vec![],
        }
    }
}

fn decode_text_frame(text: &str) -> Vec<DecodedUpdate> {
    with_parsed(text, |v| {
        if let Some(n) = crate::feeds::json_decode::get_f64(v, "ping") {
            let reply = serde_json::json!({ "pong": n as i64 }).to_string();
            return vec![DecodedUpdate::HeartbeatReply(Message::Text(reply))];
        }
        vec![DecodedUpdate::Ignored]
    })
    .unwrap_or_default()
}

fn decode_binary_frame(bytes: &[u8]) -> Vec<DecodedUpdate> {
    let channel = find_field(bytes, 1).and_then(|f| f.as_str().map(str::to_string));
    let symbol = find_field(bytes, 3).and_then(|f| f.as_str().map(str::to_string));
    let (channel, symbol) = match (channel, symbol) {
        (Some(c), Some(s)) => (c, s),
        _ => return vec![DecodedUpdate::Ignored],
    };
    if !channel.contains("depth") {
        return vec![DecodedUpdate::Ignored];
    }
    let depth_bytes = match find_field(bytes, DEPTH_FIELD).and_then(|f| f.as_bytes()) {
        Some(b) => b,
        None => return vec![DecodedUpdate::Ignored],
    };

    let mut book = OrderBook::new(Venue::Mexc, &symbol);
    walk_fields(depth_bytes, |tag, field| match (tag, field) {
        (BID_TAG, Field::Bytes(level)) => {
            if let Some((price, qty)) = decode_price_level(level) {
                book.push_bid(price, qty);
            }
        }
        (ASK_TAG, Field::Bytes(level)) => {
            if let Some((price, qty)) = decode_price_level(level) {
                book.push_ask(price, qty);
            }
        }
        _ => {}
    });

    if book.is_valid() && (book.best_bid().is_some() || book.best_ask().is_some()) {
        vec![DecodedUpdate::OrderBook(book)]
    } else {
        vec![DecodedUpdate::Ignored]
    }
}

fn decode_price_level(level: &[u8]) -> Option<(f64, f64)> {
    let mut price = None;
    let mut qty = None;
    walk_fields(level, |tag, field| match (tag, field) {
        (PRICE_TAG, Field::Bytes(b)) => price = std::str::from_utf8(b).ok().and_then(|s| fast_float::parse(s).ok()),
        (QUANTITY_TAG, Field::Bytes(b)) => {
            qty = std::str::from_utf8(b).ok().and_then(|s| fast_float::parse(s).ok())
        }
        _ => {}
    });
    match (price, qty) {
        (Some(p), Some(q)) => Some((p, q)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_tag(field_number: u64, wire_type: u64) -> u8 {
        ((field_number << 3) | wire_type) as u8
    }

    fn encode_string(field_number: u64, s: &str) -> Vec<u8> {
        let mut buf = vec![encode_tag(field_number, 2)];
        buf.push(s.len() as u8);
        buf.extend_from_slice(s.as_bytes());
        buf
    }

    fn encode_price_level(field_number: u64, price: &str, qty: &str) -> Vec<u8> {
        let mut inner = encode_string(PRICE_TAG, price);
        inner.extend(encode_string(QUANTITY_TAG, qty));
        let mut buf = vec![encode_tag(field_number, 2)];
        buf.push(inner.len() as u8);
        buf.extend(inner);
        buf
    }

    #[test]
    fn ping_frame_produces_pong_reply() {
        let updates = decode_text_frame(r#"{"ping":123456}"#);
        match &updates[0] {
            DecodedUpdate::HeartbeatReply(Message::Text(t)) => assert!(t.contains("123456")),
            _ => panic!("expected heartbeat reply"),
        }
    }

    #[test]
    fn non_ping_text_frames_are_ignored() {
        let updates = decode_text_frame(r#"{"code":0,"msg":"subscribed"}"#);
        assert!(matches!(updates[0], DecodedUpdate::Ignored));
    }

    #[test]
    fn decodes_binary_depth_push() {
        let mut depth = encode_price_level(BID_TAG, "2.1500", "100.0");
        depth.extend(encode_price_level(ASK_TAG, "2.1600", "80.0"));

        let mut frame = encode_string(1, "spot@public.increase.depth.v3.api");
        frame.extend(encode_string(3, "XRPUSDT"));
        let mut depth_field = vec![encode_tag(DEPTH_FIELD, 2)];
        depth_field.push(depth.len() as u8);
        depth_field.extend(depth);
        frame.extend(depth_field);

        let updates = decode_binary_frame(&frame);
        match &updates[0] {
            DecodedUpdate::OrderBook(b) => {
                assert_eq!(b.best_bid(), Some(2.15));
                assert_eq!(b.best_ask(), Some(2.16));
            }
            other => panic!("expected order book, got {other:?}"),
        }
    }
}
