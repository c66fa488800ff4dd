//! Binance websocket protocol, combined-stream form.
//!
//! `?streams=a@ticker/a@depth10` multiplexes both channels over one
//! connection; inbound frames arrive wrapped as `{"stream":"...","data":
//! {...}}` and are dispatched on the stream-name suffix.

use tokio_tungstenite::tungstenite::Message;

use crate::feeds::json_decode::with_parsed;
use crate::feeds::session::{DecodedUpdate, VenueProtocol};
use crate::model::{OrderBook, Ticker};
use crate::venue::Venue;

pub struct BinanceProtocol;

impl VenueProtocol for BinanceProtocol {
    fn venue(&self) -> Venue {
        Venue::Binance
    }

    fn ws_url(&self) -> String {
        "wss://stream.binance.com:9443/stream".to_string()
    }

    fn subscription_messages(&self, symbols: &[String]) -> Vec<Message> {
        // The combined-stream form selects channels via the URL path rather
        // than a subscribe frame, but the session always connects to
        // `ws_url()` verbatim, so we reconnect with the frame-based
        // `SUBSCRIBE` method instead — same effect, works over the plain
        // `/stream` endpoint.
        let params: Vec<String> = symbols
            .iter()
            .flat_map(|s| {
                let lower = s.to_lowercase();
                vec![format!("{lower}@ticker"), format!("{lower}@depth10")]
            })
            .collect();
        let payload = serde_json::json!({
            "method": "SUBSCRIBE",
            "params": params,
            "id": 1,
        });
        vec![Message::Text(payload.to_string())]
    }

    fn decode(&self, msg: &Message) -> Vec<DecodedUpdate> {
        let text = match msg {
            Message::Text(t) => t.clone(),
            _ => return vec![],
        };
        decode_binance_frame(&text)
    }
}

fn decode_binance_frame(text: &str) -> Vec<DecodedUpdate> {
    use simd_json::prelude::*;

    with_parsed(text, |v| {
        let (stream, data) = match (v.get("stream").and_then(|s| s.as_str()), v.get("data")) {
            (Some(s), Some(d)) => (s, d),
            _ => (v.get("e").and_then(|e| e.as_str()).unwrap_or(""), v),
        };

        if stream.ends_with("@ticker") || data.get("e").and_then(|e| e.as_str()) == Some("24hrTicker") {
            let symbol = data.get("s").and_then(|x| x.as_str()).unwrap_or("");
            let bid = crate::feeds::json_decode::get_f64(data, "b");
            let ask = crate::feeds::json_decode::get_f64(data, "a");
            let last = crate::feeds::json_decode::get_f64(data, "c");
            if let (Some(bid), Some(ask), Some(last)) = (bid, ask, last) {
                return vec![DecodedUpdate::Ticker(Ticker::new(
                    Venue::Binance,
                    symbol,
                    last,
                    bid,
                    ask,
                ))];
            }
            return vec![];
        }

        if stream.ends_with("@depth10") || (data.get("bids").is_some() && data.get("asks").is_some())
        {
            let symbol = data
                .get("s")
                .and_then(|x| x.as_str())
                .unwrap_or_else(|| stream.split('@').next().unwrap_or(""));
            let mut book = OrderBook::new(Venue::Binance, symbol);
            if let Some(bids) = data.get("bids").and_then(|b| b.as_array()) {
                for level in bids {
                    if let Some(pair) = level.as_array() {
                        if let (Some(p), Some(q)) = (level_f64(pair, 0), level_f64(pair, 1)) {
                            book.push_bid(p, q);
                        }
                    }
                }
            }
            if let Some(asks) = data.get("asks").and_then(|a| a.as_array()) {
                for level in asks {
                    if let Some(pair) = level.as_array() {
                        if let (Some(p), Some(q)) = (level_f64(pair, 0), level_f64(pair, 1)) {
                            book.push_ask(p, q);
                        }
                    }
                }
            }
            if book.is_valid() {
                return vec![DecodedUpdate::OrderBook(book)];
            }
            return vec![];
        }

        vec![]
    })
    .unwrap_or_default()
}

fn level_f64(pair: &[simd_json::BorrowedValue<'_>], idx: usize) -> Option<f64> {
    use simd_json::prelude::*;
    let item = pair.get(idx)?;
    item.as_f64().or_else(|| item.as_str().and_then(|s| fast_float::parse(s).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ticker_stream_frame() {
        let text = r#"{"stream":"xrpusdt@ticker","data":{"e":"24hrTicker","s":"XRPUSDT","b":"2.15","a":"2.16","c":"2.155"}}"#;
        let updates = decode_binance_frame(text);
        assert_eq!(updates.len(), 1);
        match &updates[0] {
            DecodedUpdate::Ticker(t) => {
                assert_eq!(t.symbol_str(), "XRPUSDT");
                assert!(t.is_valid_for_spread());
            }
            _ => panic!("expected ticker"),
        }
    }

    #[test]
    fn decodes_depth_stream_frame() {
        let text = r#"{"stream":"xrpusdt@depth10","data":{"bids":[["2.15","100"]],"asks":[["2.16","80"]]}}"#;
        let updates = decode_binance_frame(text);
        match &updates[0] {
            DecodedUpdate::OrderBook(b) => {
                assert_eq!(b.best_bid(), Some(2.15));
                assert_eq!(b.best_ask(), Some(2.16));
            }
            _ => panic!("expected order book"),
        }
    }

    #[test]
    fn subscribe_params_use_lowercase_symbol() {
        let proto = BinanceProtocol;
        let messages = proto.subscription_messages(&["XRPUSDT".to_string()]);
        if let Message::Text(text) = &messages[0] {
            assert!(text.contains("xrpusdt@ticker"));
            assert!(text.contains("xrpusdt@depth10"));
        } else {
            panic!("expected text message");
        }
    }
}
