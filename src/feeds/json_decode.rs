//! Thread-local JSON scratch parser.
//!
//! `simd_json` mutates its input in place and borrows from it, so each
//! decode needs an owned, mutable scratch buffer. Parking one per thread
//! avoids a fresh allocation on every inbound frame on the steady-state path
//! (spec.md §4.2 "Message decoding").

use std::cell::RefCell;

thread_local! {
    static SCRATCH: RefCell<Vec<u8>> = RefCell::new(Vec::with_capacity(4096));
}

/// Parses `text` as a borrowed JSON value and hands it to `f`. The value
/// only lives for the duration of `f` since it borrows the thread-local
/// scratch buffer.
pub fn with_parsed<R>(
    text: &str,
    f: impl FnOnce(&simd_json::BorrowedValue<'_>) -> R,
) -> Result<R, crate::error::CoreError> {
    SCRATCH.with(|scratch| {
        let mut buf = scratch.borrow_mut();
        buf.clear();
        buf.extend_from_slice(text.as_bytes());
        let value = simd_json::to_borrowed_value(&mut buf)
            .map_err(|e| crate::error::CoreError::parse_error(e.to_string()))?;
        Ok(f(&value))
    })
}

/// Looks up a numeric field that may arrive as a JSON number or a string
/// (every venue here sends prices as strings at least some of the time).
pub fn get_f64(value: &simd_json::BorrowedValue<'_>, key: &str) -> Option<f64> {
    use simd_json::prelude::*;
    let field = value.get(key)?;
    if let Some(n) = field.as_f64() {
        return Some(n);
    }
    field.as_str().and_then(|s| fast_float::parse(s).ok())
}

pub fn get_str<'v>(value: &'v simd_json::BorrowedValue<'_>, key: &str) -> Option<&'v str> {
    use simd_json::prelude::*;
    value.get(key)?.as_str()
}
