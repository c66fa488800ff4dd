//! Bithumb websocket protocol (v2 API, `wss://ws-api.bithumb.com/websocket/v1`).
//!
//! Bithumb's v2 stream mirrors Upbit's wire schema (ticket + type/codes
//! subscribe frame, `orderbook_units` payload), so decoding reuses
//! [`crate::feeds::upbit::decode_upbit_style`] with the venue tag swapped.

use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::feeds::session::{DecodedUpdate, VenueProtocol};
use crate::feeds::upbit::decode_upbit_style;
use crate::venue::Venue;

pub struct BithumbProtocol;

impl VenueProtocol for BithumbProtocol {
    fn venue(&self) -> Venue {
        Venue::Bithumb
    }

    fn ws_url(&self) -> String {
        "wss://ws-api.bithumb.com/websocket/v1".to_string()
    }

    fn subscription_messages(&self, symbols: &[String]) -> Vec<Message> {
        let ticket = serde_json::json!({ "ticket": Uuid::new_v4().to_string() });
        let orderbook = serde_json::json!({
            "type": "orderbook",
            "codes": symbols,
        });
        let payload = serde_json::json!([ticket, orderbook]);
        vec![Message::Text(payload.to_string())]
    }

    fn decode(&self, msg: &Message) -> Vec<DecodedUpdate> {
        let text = match msg {
            Message::Text(t) => t.clone(),
            Message::Binary(b) => match String::from_utf8(b.clone()) {
                Ok(s) => s,
                Err(_) => return vec![],
            },
            _ => return vec![],
        };
        decode_upbit_style(Venue::Bithumb, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_payload_carries_symbols() {
        let proto = BithumbProtocol;
        let messages = proto.subscription_messages(&["KRW-XRP".to_string()]);
        if let Message::Text(text) = &messages[0] {
            assert!(text.contains("KRW-XRP"));
        } else {
            panic!("expected text message");
        }
    }

    #[test]
    fn decodes_with_bithumb_venue_tag() {
        let text = r#"{"type":"orderbook","code":"KRW-XRP","orderbook_units":[
            {"ask_price":3101.0,"bid_price":3099.0,"ask_size":10.0,"bid_size":12.0}
        ]}"#;
        let updates = decode_upbit_style(Venue::Bithumb, text);
        match &updates[0] {
            DecodedUpdate::OrderBook(b) => assert_eq!(b.venue, Venue::Bithumb),
            _ => panic!("expected order book"),
        }
    }
}
