//! Transfer manager and address book (spec.md §4.6).
//!
//! Moves XRP between venues once a dual-leg trade leaves one venue holding
//! inventory the other one needs. Withdraw submission and status polling go
//! through `WithdrawClient`, one per venue, mirroring the order-client split
//! in `order_clients`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::{binance_signature, bithumb_signature, mexc_signature, upbit_jwt};
use crate::config::{AddressBookEntry, ExchangeConfig};
use crate::error::{CoreError, CoreResult};
use crate::fees::xrp_min_withdraw;
use crate::model::{TransferRequest, TransferResult, TransferStatus};
use crate::order_clients::http_client;
use crate::rate_limit::{ApiClass, RateLimiterRegistry};
use crate::venue::Venue;

pub struct AddressBook {
    entries: Vec<AddressBookEntry>,
}

impl AddressBook {
    pub fn new(entries: Vec<AddressBookEntry>) -> Self {
        Self { entries }
    }

    pub fn is_whitelisted(&self, to: Venue, address: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.venue == to && e.address == address && e.whitelisted)
    }
}

/// Validates a transfer request before any network call, per spec.md §4.6.
/// Returns the rejection reason, or `None` if the request may proceed.
pub fn validate(request: &TransferRequest, address_book: &AddressBook) -> Option<&'static str> {
    if request.from == request.to {
        return Some("source and destination venue are the same");
    }
    if request.amount <= 0.0 {
        return Some("amount must be positive");
    }
    if request.coin.eq_ignore_ascii_case("xrp") && request.destination_tag.is_none() {
        return Some("XRP transfers require a destination tag");
    }
    if request.amount < xrp_min_withdraw(request.from) {
        return Some("amount is below the venue's minimum withdrawal");
    }
    if !address_book.is_whitelisted(request.to, &request.to_address) {
        return Some("destination address is not whitelisted");
    }
    None
}

#[async_trait]
pub trait WithdrawClient: Send + Sync {
    async fn withdraw(&self, request: &TransferRequest) -> CoreResult<TransferResult>;
    async fn poll_status(&self, transfer_id: &str) -> CoreResult<TransferStatus>;
}

/// A single withdraw client whose wire format is selected by `venue`, since
/// the four REST shapes differ only in endpoint path and auth scheme (the
/// same split the feed and order clients use per-venue would just repeat
/// this dispatch four times over).
pub struct VenueWithdrawClient {
    venue: Venue,
    config: ExchangeConfig,
    rate_limiter: Arc<RateLimiterRegistry>,
    http: reqwest::Client,
}

impl VenueWithdrawClient {
    pub fn new(venue: Venue, config: ExchangeConfig, rate_limiter: Arc<RateLimiterRegistry>) -> Self {
        Self {
            venue,
            config,
            rate_limiter,
            http: http_client(),
        }
    }
}

#[async_trait]
impl WithdrawClient for VenueWithdrawClient {
    async fn withdraw(&self, request: &TransferRequest) -> CoreResult<TransferResult> {
        self.rate_limiter.try_acquire(self.venue, ApiClass::Order)?;

        let resp = match self.venue {
            Venue::Upbit | Venue::Bithumb => self.withdraw_upbit_style(request).await?,
            Venue::Binance | Venue::Mexc => self.withdraw_binance_style(request).await?,
        };
        Ok(resp)
    }

    async fn poll_status(&self, transfer_id: &str) -> CoreResult<TransferStatus> {
        self.rate_limiter.try_acquire(self.venue, ApiClass::Query)?;

        let url = match self.venue {
            Venue::Upbit | Venue::Bithumb => format!("{}/v1/withdraw?uuid={transfer_id}", self.config.rest_url),
            Venue::Binance | Venue::Mexc => {
                format!("{}/sapi/v1/capital/withdraw/history?id={transfer_id}", self.config.rest_url)
            }
        };
        let query = match self.venue {
            Venue::Upbit => format!("uuid={transfer_id}"),
            _ => String::new(),
        };
        let auth_header = self.auth_header(&query)?;

        let resp = self
            .http
            .get(&url)
            .header(auth_header.0, auth_header.1)
            .send()
            .await
            .map_err(CoreError::from)?;
        let body: serde_json::Value = resp.json().await.map_err(CoreError::from)?;

        let raw_state = match self.venue {
            Venue::Upbit | Venue::Bithumb => body.get("state").and_then(|s| s.as_str()).unwrap_or(""),
            Venue::Binance | Venue::Mexc => body
                .get(0)
                .and_then(|v| v.get("status"))
                .and_then(|s| s.as_str())
                .unwrap_or(""),
        };
        Ok(normalize_transfer_status(raw_state))
    }
}

impl VenueWithdrawClient {
    fn auth_header(&self, query_string: &str) -> CoreResult<(&'static str, String)> {
        match self.venue {
            Venue::Upbit => Ok(("Authorization", upbit_jwt(&self.config.api_key, &self.config.api_secret, query_string)?)),
            Venue::Bithumb => Ok(("Api-Key", self.config.api_key.clone())),
            Venue::Binance => Ok(("X-MBX-APIKEY", self.config.api_key.clone())),
            Venue::Mexc => Ok(("X-MEXC-APIKEY", self.config.api_key.clone())),
        }
    }

    async fn withdraw_upbit_style(&self, request: &TransferRequest) -> CoreResult<TransferResult> {
        let mut params = vec![
            ("currency".to_string(), request.coin.clone()),
            ("amount".to_string(), request.amount.to_string()),
            ("address".to_string(), request.to_address.clone()),
        ];
        if let Some(tag) = &request.destination_tag {
            params.push(("secondary_address".to_string(), tag.clone()));
        }
        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let resp = if self.venue == Venue::Upbit {
            let auth = upbit_jwt(&self.config.api_key, &self.config.api_secret, &query_string)?;
            self.http
                .post(format!("{}/v1/withdraws/coin", self.config.rest_url))
                .header("Authorization", auth)
                .form(&params)
                .send()
                .await
                .map_err(CoreError::from)?
        } else {
            let (sig, nonce) = bithumb_signature(&self.config.api_secret, "/v1/withdraws/coin", &query_string)?;
            self.http
                .post(format!("{}/v1/withdraws/coin", self.config.rest_url))
                .header("Api-Key", &self.config.api_key)
                .header("Api-Sign", sig)
                .header("Api-Nonce", nonce)
                .form(&params)
                .send()
                .await
                .map_err(CoreError::from)?
        };

        decode_withdraw_response(resp, self.venue).await
    }

    async fn withdraw_binance_style(&self, request: &TransferRequest) -> CoreResult<TransferResult> {
        let mut params = vec![
            ("coin".to_string(), request.coin.clone()),
            ("address".to_string(), request.to_address.clone()),
            ("amount".to_string(), request.amount.to_string()),
            ("timestamp".to_string(), now_ms().to_string()),
        ];
        if let Some(tag) = &request.destination_tag {
            params.push(("addressTag".to_string(), tag.clone()));
        }
        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let signature = if self.venue == Venue::Binance {
            binance_signature(&self.config.api_secret, &query_string)?
        } else {
            mexc_signature(&self.config.api_secret, &query_string)?
        };
        params.push(("signature".to_string(), signature));

        let header_name = if self.venue == Venue::Binance { "X-MBX-APIKEY" } else { "X-MEXC-APIKEY" };
        let resp = self
            .http
            .post(format!("{}/sapi/v1/capital/withdraw/apply", self.config.rest_url))
            .header(header_name, &self.config.api_key)
            .query(&params)
            .send()
            .await
            .map_err(CoreError::from)?;

        decode_withdraw_response(resp, self.venue).await
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

async fn decode_withdraw_response(resp: reqwest::Response, venue: Venue) -> CoreResult<TransferResult> {
    let status_ok = resp.status().is_success();
    let body: serde_json::Value = resp.json().await.map_err(CoreError::from)?;
    if !status_ok {
        let message = body
            .get("error")
            .and_then(|e| e.get("message"))
            .or_else(|| body.get("msg"))
            .and_then(|m| m.as_str())
            .unwrap_or("withdraw request failed")
            .to_string();
        return Ok(TransferResult::rejected(message));
    }

    let transfer_id = match venue {
        Venue::Upbit | Venue::Bithumb => body.get("uuid").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        Venue::Binance | Venue::Mexc => body.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string(),
    };
    let txhash = body.get("txid").and_then(|v| v.as_str()).map(str::to_string);

    Ok(TransferResult {
        transfer_id,
        txhash,
        status: TransferStatus::Pending,
        elapsed_ms: 0,
        fee: crate::fees::xrp_withdraw_fee(venue),
        error: None,
    })
}

fn normalize_transfer_status(raw: &str) -> TransferStatus {
    match raw.to_ascii_uppercase().as_str() {
        "DONE" | "COMPLETED" | "SUCCESS" => TransferStatus::Completed,
        "PROCESSING" | "WORKING" | "SUBMITTING" => TransferStatus::Processing,
        "CANCELLED" | "CANCELED" => TransferStatus::Cancelled,
        "FAILED" | "REJECTED" => TransferStatus::Failed,
        "WAITING" | "" => TransferStatus::Pending,
        _ => TransferStatus::Pending,
    }
}

type TransitionCallback = Box<dyn Fn(&TransferResult) + Send + Sync>;

#[derive(Default)]
struct TransferStats {
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransferStatsSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
}

pub struct TransferManager {
    clients: HashMap<Venue, Arc<dyn WithdrawClient>>,
    address_book: AddressBook,
    poll_interval: Duration,
    overall_timeout: Duration,
    dry_run: bool,
    on_transition: Option<TransitionCallback>,
    on_complete: Option<TransitionCallback>,
    stats: TransferStats,
}

impl TransferManager {
    pub fn new(
        clients: HashMap<Venue, Arc<dyn WithdrawClient>>,
        address_book: AddressBook,
        poll_interval: Duration,
        overall_timeout: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            clients,
            address_book,
            poll_interval,
            overall_timeout,
            dry_run,
            on_transition: None,
            on_complete: None,
            stats: TransferStats::default(),
        }
    }

    pub fn with_transition_callback(mut self, callback: TransitionCallback) -> Self {
        self.on_transition = Some(callback);
        self
    }

    pub fn with_completion_callback(mut self, callback: TransitionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    /// Submits the withdraw and waits for a terminal status, honoring the
    /// overall timeout. Rejects synchronously (no network call) if
    /// `validate` finds the request malformed.
    pub async fn submit_and_wait(&self, request: TransferRequest) -> TransferResult {
        if let Some(reason) = validate(&request, &self.address_book) {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            let result = TransferResult::rejected(reason);
            self.notify_transition(&result);
            self.notify_complete(&result);
            return result;
        }

        self.stats.submitted.fetch_add(1, Ordering::Relaxed);

        if self.dry_run {
            let result = TransferResult {
                transfer_id: format!("dryrun-transfer-{}", uuid::Uuid::new_v4()),
                txhash: Some(format!("dryrun-tx-{}", uuid::Uuid::new_v4())),
                status: TransferStatus::Completed,
                elapsed_ms: 0,
                fee: crate::fees::xrp_withdraw_fee(request.from),
                error: None,
            };
            self.stats.completed.fetch_add(1, Ordering::Relaxed);
            self.notify_transition(&result);
            self.notify_complete(&result);
            return result;
        }

        let client = match self.clients.get(&request.from) {
            Some(c) => c,
            None => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                let result = TransferResult::rejected("no withdraw client configured for source venue");
                self.notify_transition(&result);
                self.notify_complete(&result);
                return result;
            }
        };

        let initial = match client.withdraw(&request).await {
            Ok(result) => result,
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                let result = TransferResult::rejected(e.to_string());
                self.notify_transition(&result);
                self.notify_complete(&result);
                return result;
            }
        };
        self.notify_transition(&initial);

        let start = std::time::Instant::now();
        let transfer_id = initial.transfer_id.clone();
        let final_result = match tokio::time::timeout(
            self.overall_timeout,
            self.poll_until_terminal(client.as_ref(), &transfer_id, &initial),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => TransferResult {
                status: TransferStatus::Timeout,
                elapsed_ms: start.elapsed().as_millis() as u64,
                ..initial
            },
        };

        match final_result.status {
            TransferStatus::Completed => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
            }
            TransferStatus::Timeout => {
                self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
            }
            TransferStatus::Failed | TransferStatus::Cancelled => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        self.notify_transition(&final_result);
        self.notify_complete(&final_result);
        final_result
    }

    async fn poll_until_terminal(
        &self,
        client: &dyn WithdrawClient,
        transfer_id: &str,
        initial: &TransferResult,
    ) -> TransferResult {
        let start = std::time::Instant::now();
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let status = match client.poll_status(transfer_id).await {
                Ok(status) => status,
                Err(_) => continue,
            };
            let snapshot = TransferResult {
                status,
                elapsed_ms: start.elapsed().as_millis() as u64,
                ..initial.clone()
            };
            if is_terminal(status) {
                return snapshot;
            }
            self.notify_transition(&snapshot);
        }
    }

    fn notify_transition(&self, result: &TransferResult) {
        if let Some(cb) = &self.on_transition {
            cb(result);
        }
    }

    fn notify_complete(&self, result: &TransferResult) {
        if is_terminal(result.status) || result.status == TransferStatus::Failed {
            if let Some(cb) = &self.on_complete {
                cb(result);
            }
        }
    }

    pub fn stats(&self) -> TransferStatsSnapshot {
        TransferStatsSnapshot {
            submitted: self.stats.submitted.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            timed_out: self.stats.timed_out.load(Ordering::Relaxed),
        }
    }
}

fn is_terminal(status: TransferStatus) -> bool {
    matches!(
        status,
        TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled | TransferStatus::Timeout
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn address_book() -> AddressBook {
        AddressBook::new(vec![AddressBookEntry {
            venue: Venue::Upbit,
            address: "rWhitelisted".to_string(),
            destination_tag: Some("123".to_string()),
            whitelisted: true,
        }])
    }

    fn xrp_request(to_address: &str, destination_tag: Option<&str>) -> TransferRequest {
        TransferRequest {
            from: Venue::Binance,
            to: Venue::Upbit,
            coin: "XRP".to_string(),
            amount: 100.0,
            to_address: to_address.to_string(),
            destination_tag: destination_tag.map(str::to_string),
        }
    }

    #[test]
    fn rejects_same_venue_transfer() {
        let mut req = xrp_request("rWhitelisted", Some("123"));
        req.to = Venue::Binance;
        assert!(validate(&req, &address_book()).is_some());
    }

    #[test]
    fn rejects_xrp_transfer_without_destination_tag() {
        let req = xrp_request("rWhitelisted", None);
        assert_eq!(
            validate(&req, &address_book()),
            Some("XRP transfers require a destination tag")
        );
    }

    #[test]
    fn rejects_non_whitelisted_address() {
        let req = xrp_request("rSomeoneElse", Some("123"));
        assert_eq!(validate(&req, &address_book()), Some("destination address is not whitelisted"));
    }

    #[test]
    fn rejects_below_minimum_amount() {
        let mut req = xrp_request("rWhitelisted", Some("123"));
        req.amount = 0.5;
        assert_eq!(validate(&req, &address_book()), Some("amount is below the venue's minimum withdrawal"));
    }

    #[test]
    fn accepts_a_well_formed_request() {
        let req = xrp_request("rWhitelisted", Some("123"));
        assert!(validate(&req, &address_book()).is_none());
    }

    struct MockWithdrawClient {
        statuses: Mutex<Vec<TransferStatus>>,
    }

    #[async_trait]
    impl WithdrawClient for MockWithdrawClient {
        async fn withdraw(&self, _request: &TransferRequest) -> CoreResult<TransferResult> {
            Ok(TransferResult {
                transfer_id: "t-1".to_string(),
                txhash: None,
                status: TransferStatus::Pending,
                elapsed_ms: 0,
                fee: 0.25,
                error: None,
            })
        }

        async fn poll_status(&self, _transfer_id: &str) -> CoreResult<TransferStatus> {
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.is_empty() {
                Ok(TransferStatus::Completed)
            } else {
                Ok(statuses.remove(0))
            }
        }
    }

    #[tokio::test]
    async fn rejected_request_never_calls_the_withdraw_client() {
        let clients: HashMap<Venue, Arc<dyn WithdrawClient>> = HashMap::new();
        let mgr = TransferManager::new(clients, address_book(), Duration::from_millis(5), Duration::from_secs(1), false);
        let result = mgr.submit_and_wait(xrp_request("rSomeoneElse", Some("123"))).await;
        assert_eq!(result.status, TransferStatus::Failed);
        assert_eq!(mgr.stats().rejected, 1);
        assert_eq!(mgr.stats().failed, 1);
        assert_eq!(mgr.stats().submitted, 0);
    }

    #[tokio::test]
    async fn polls_until_completed_status() {
        let mut clients: HashMap<Venue, Arc<dyn WithdrawClient>> = HashMap::new();
        clients.insert(
            Venue::Binance,
            Arc::new(MockWithdrawClient {
                statuses: Mutex::new(vec![TransferStatus::Processing, TransferStatus::Processing]),
            }),
        );
        let mgr = TransferManager::new(clients, address_book(), Duration::from_millis(2), Duration::from_secs(2), false);
        let result = mgr.submit_and_wait(xrp_request("rWhitelisted", Some("123"))).await;
        assert_eq!(result.status, TransferStatus::Completed);
        assert_eq!(mgr.stats().completed, 1);
    }

    #[tokio::test]
    async fn overall_timeout_yields_timeout_status() {
        let mut clients: HashMap<Venue, Arc<dyn WithdrawClient>> = HashMap::new();
        clients.insert(
            Venue::Binance,
            Arc::new(MockWithdrawClient {
                statuses: Mutex::new(vec![
                    TransferStatus::Processing,
                    TransferStatus::Processing,
                    TransferStatus::Processing,
                    TransferStatus::Processing,
                    TransferStatus::Processing,
                ]),
            }),
        );
        let mgr = TransferManager::new(clients, address_book(), Duration::from_millis(20), Duration::from_millis(30), false);
        let result = mgr.submit_and_wait(xrp_request("rWhitelisted", Some("123"))).await;
        assert_eq!(result.status, TransferStatus::Timeout);
        assert_eq!(mgr.stats().timed_out, 1);
    }

    #[tokio::test]
    async fn dry_run_completes_synthetically_without_a_client() {
        let clients: HashMap<Venue, Arc<dyn WithdrawClient>> = HashMap::new();
        let mgr = TransferManager::new(clients, address_book(), Duration::from_millis(5), Duration::from_secs(1), true);
        let result = mgr.submit_and_wait(xrp_request("rWhitelisted", Some("123"))).await;
        assert_eq!(result.status, TransferStatus::Completed);
        assert!(result.transfer_id.starts_with("dryrun-transfer-"));
    }
}
