//! Publisher for the external monitoring server (spec.md §6): length-prefixed
//! framed messages over TCP, consumed by an operator CLI that is not part of
//! this core. Framing follows the edge receiver's fixed-header convention
//! (`edge/wire.rs`) generalized to a 4-byte length prefix ahead of a
//! variable-length JSON payload, since monitor frames are heterogeneous
//! snapshots rather than one fixed-size tick record.

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::premium::PremiumMatrix;
use crate::venue::Venue;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame_type")]
pub enum MonitorFrame {
    QueueSnapshot {
        venue: Venue,
        depth: usize,
        capacity: usize,
    },
    ExecutorStats {
        total_requests: u64,
        both_success: u64,
        partial_success: u64,
        total_failures: u64,
        recovery_attempts: u64,
        recovery_successes: u64,
    },
    PremiumSnapshot {
        matrix: PremiumMatrix,
        best_buy: Option<Venue>,
        best_sell: Option<Venue>,
        best_premium_pct: f64,
    },
}

/// Serializes `frame` to JSON and prepends its length as a big-endian u32.
pub fn encode_frame(frame: &MonitorFrame) -> CoreResult<Vec<u8>> {
    let payload = serde_json::to_vec(frame).map_err(CoreError::from)?;
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decodes a single length-prefixed frame from the front of `bytes`.
/// Returns the frame and the number of bytes consumed.
pub fn decode_frame(bytes: &[u8]) -> CoreResult<(MonitorFrame, usize)> {
    if bytes.len() < 4 {
        return Err(CoreError::parse_error("frame too short for length prefix"));
    }
    let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let end = 4 + len;
    if bytes.len() < end {
        return Err(CoreError::parse_error("frame truncated"));
    }
    let frame: MonitorFrame = serde_json::from_slice(&bytes[4..end]).map_err(CoreError::from)?;
    Ok((frame, end))
}

/// Lazily-connecting TCP publisher. A write failure drops the connection;
/// the next `publish` call reconnects rather than retrying immediately, so
/// a down monitor server never blocks the hot path beyond one failed write.
pub struct MonitorPublisher {
    addr: String,
    stream: Mutex<Option<TcpStream>>,
}

impl MonitorPublisher {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: Mutex::new(None),
        }
    }

    pub async fn publish(&self, frame: &MonitorFrame) -> CoreResult<()> {
        let bytes = encode_frame(frame)?;
        let mut guard = self.stream.lock().await;

        if guard.is_none() {
            *guard = TcpStream::connect(&self.addr).await.ok();
        }

        match guard.as_mut() {
            Some(stream) => match stream.write_all(&bytes).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    *guard = None;
                    Err(CoreError::connection_failed(e.to_string()))
                }
            },
            None => Err(CoreError::connection_failed("monitor server unreachable")),
        }
    }
}
