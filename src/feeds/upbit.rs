//! Upbit websocket protocol (`wss://api.upbit.com/websocket/v1`).
//!
//! Upbit's subscribe payload is a single JSON array: a ticket object
//! followed by one type/codes object per channel. We subscribe to the
//! orderbook channel only — it carries best bid/ask directly, from which we
//! also synthesize a `Ticker` rather than needing a second channel.

use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::feeds::json_decode::with_parsed;
use crate::feeds::session::{DecodedUpdate, VenueProtocol};
use crate::model::{OrderBook, Ticker};
use crate::venue::Venue;

pub struct UpbitProtocol;

impl VenueProtocol for UpbitProtocol {
    fn venue(&self) -> Venue {
        Venue::Upbit
    }

    fn ws_url(&self) -> String {
        "wss://api.upbit.com/websocket/v1".to_string()
    }

    fn subscription_messages(&self, symbols: &[String]) -> Vec<Message> {
        let ticket = serde_json::json!({ "ticket": Uuid::new_v4().to_string() });
        let orderbook = serde_json::json!({
            "type": "orderbook",
            "codes": symbols,
            "isOnlyRealtime": true,
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
        decode_upbit_style(Venue::Upbit, &text)
    }
}

/// Shared by Upbit and Bithumb v2: both publish `{"type":"orderbook",
/// "code":"KRW-XRP","orderbook_units":[{ask_price,bid_price,ask_size,
/// bid_size},...]}`.
pub fn decode_upbit_style(venue: Venue, text: &str) -> Vec<DecodedUpdate> {
    use simd_json::prelude::*;

    with_parsed(text, |v| {
        let msg_type = v.get("type").and_then(|t| t.as_str()).unwrap_or("");
        if msg_type != "orderbook" {
            return vec![];
        }
        let code = v.get("code").and_then(|c| c.as_str()).unwrap_or("");
        let units = match v.get("orderbook_units").and_then(|u| u.as_array()) {
            Some(u) => u,
            None => return vec![],
        };
        let mut book = OrderBook::new(venue, code);
        for unit in units {
            let bid_price = unit.get("bid_price").and_then(|x| x.as_f64());
            let bid_size = unit.get("bid_size").and_then(|x| x.as_f64());
            let ask_price = unit.get("ask_price").and_then(|x| x.as_f64());
            let ask_size = unit.get("ask_size").and_then(|x| x.as_f64());
            if let (Some(p), Some(q)) = (bid_price, bid_size) {
                book.push_bid(p, q);
            }
            if let (Some(p), Some(q)) = (ask_price, ask_size) {
                book.push_ask(p, q);
            }
        }
        if !book.is_valid() {
            return vec![];
        }
        let best = (book.best_bid(), book.best_ask());
        let mut updates = vec![DecodedUpdate::OrderBook(book)];
        if let (Some(bid), Some(ask)) = best {
            let last = (bid + ask) / 2.0;
            updates.push(DecodedUpdate::Ticker(Ticker::new(venue, code, last, bid, ask)));
        }
        updates
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_orderbook_json() -> &'static str {
        r#"{"type":"orderbook","code":"KRW-XRP","orderbook_units":[
            {"ask_price":3101.0,"bid_price":3099.0,"ask_size":10.0,"bid_size":12.0},
            {"ask_price":3102.0,"bid_price":3098.0,"ask_size":5.0,"bid_size":7.0}
        ]}"#
    }

    #[test]
    fn decodes_orderbook_into_book_and_synthetic_ticker() {
        let updates = decode_upbit_style(Venue::Upbit, sample_orderbook_json());
        assert_eq!(updates.len(), 2);
        match &updates[0] {
            DecodedUpdate::OrderBook(b) => {
                assert_eq!(b.best_bid(), Some(3099.0));
                assert_eq!(b.best_ask(), Some(3101.0));
            }
            _ => panic!("expected order book first"),
        }
        match &updates[1] {
            DecodedUpdate::Ticker(t) => assert!(t.is_valid_for_spread()),
            _ => panic!("expected ticker second"),
        }
    }

    #[test]
    fn non_orderbook_messages_are_ignored() {
        let updates = decode_upbit_style(Venue::Upbit, r#"{"type":"trade","code":"KRW-XRP"}"#);
        assert!(updates.is_empty());
    }

    #[test]
    fn subscription_payload_is_a_two_element_array() {
        let proto = UpbitProtocol;
        let messages = proto.subscription_messages(&["KRW-XRP".to_string()]);
        assert_eq!(messages.len(), 1);
        if let Message::Text(text) = &messages[0] {
            let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
            assert!(parsed.is_array());
            assert_eq!(parsed.as_array().unwrap().len(), 2);
        } else {
            panic!("expected text message");
        }
    }
}
