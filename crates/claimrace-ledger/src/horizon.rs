//! Horizon REST adapter.
//!
//! Provides read access to claimable balances, accounts and account
//! operations, and submission of signed transaction envelopes. Building and signing envelopes is delegated
//! to an [`EnvelopeSigner`] collaborator.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use claimrace_core::{
    Address, Amount, ClaimableResource, Claimant, RawPredicate, ResourceId, TxHash,
};

use crate::error::{FailureKind, LedgerError, LedgerResult, SubmitError};
use crate::ledger::{
    BoxFuture, ClaimReceipt, ClaimSubmission, LedgerQuery, LedgerSubmitter, OperationRecord,
    TransferSubmission,
};
use crate::result_codes::classify_result_codes;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Base reserve used until the latest ledger has been fetched (0.49 units).
const DEFAULT_BASE_RESERVE_STROOPS: i64 = 4_900_000;

#[derive(Debug, Deserialize)]
struct RawClaimant {
    destination: String,
    #[serde(default)]
    predicate: RawPredicate,
}

#[derive(Debug, Deserialize)]
struct RawClaimableBalance {
    id: String,
    #[serde(default = "native_asset")]
    asset: String,
    amount: String,
    #[serde(default)]
    claimants: Vec<RawClaimant>,
}

fn native_asset() -> String {
    "native".to_string()
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    balance: String,
    asset_type: String,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    #[serde(default)]
    subentry_count: u32,
    #[serde(default)]
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawOperation {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    transaction_hash: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    amount: Option<String>,
    /// Set instead of `amount` on account creation.
    #[serde(default)]
    starting_balance: Option<String>,
}

impl TryFrom<RawOperation> for OperationRecord {
    type Error = LedgerError;

    fn try_from(raw: RawOperation) -> Result<Self, Self::Error> {
        let amount = raw
            .amount
            .or(raw.starting_balance)
            .map(|a| a.parse::<Amount>())
            .transpose()?;
        Ok(OperationRecord {
            id: raw.id,
            kind: raw.kind,
            amount,
            tx_hash: TxHash(raw.transaction_hash),
            created_at: raw.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Embedded<T> {
    records: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(rename = "_embedded")]
    embedded: Embedded<T>,
}

#[derive(Debug, Deserialize)]
struct RawLedger {
    base_reserve_in_stroops: i64,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    hash: String,
    #[serde(default = "default_true")]
    successful: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
struct ResultCodes {
    transaction: Option<String>,
    #[serde(default)]
    operations: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProblemExtras {
    #[serde(default)]
    result_codes: ResultCodes,
}

#[derive(Debug, Deserialize)]
struct Problem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extras: Option<ProblemExtras>,
}

impl TryFrom<RawClaimableBalance> for ClaimableResource {
    type Error = LedgerError;

    fn try_from(raw: RawClaimableBalance) -> Result<Self, Self::Error> {
        let amount: Amount = raw.amount.parse()?;
        Ok(ClaimableResource {
            id: ResourceId::new(raw.id),
            amount,
            asset: raw.asset,
            claimants: raw
                .claimants
                .into_iter()
                .map(|c| Claimant {
                    destination: Address::new(c.destination),
                    predicate: c.predicate,
                })
                .collect(),
        })
    }
}

/// Client for a Horizon REST endpoint.
pub struct HorizonClient {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Latest known base reserve in stroops.
    base_reserve_stroops: AtomicI64,
}

impl HorizonClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Horizon root (e.g., "https://api.testnet.minepi.com")
    pub fn new(base_url: impl Into<String>) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            base_reserve_stroops: AtomicI64::new(DEFAULT_BASE_RESERVE_STROOPS),
        })
    }

    /// Current base reserve.
    pub fn base_reserve(&self) -> Amount {
        Amount::from_stroops(self.base_reserve_stroops.load(Ordering::Relaxed))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> LedgerResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LedgerError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LedgerError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::HttpClient(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(format!("Failed to parse response: {e}")))
    }

    /// Refresh the base reserve from the most recent ledger.
    ///
    /// Keeps the previous value when the request fails.
    pub async fn refresh_base_reserve(&self) -> LedgerResult<Amount> {
        let page: Page<RawLedger> = self.get_json("/ledgers?order=desc&limit=1").await?;
        let ledger = page
            .embedded
            .records
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::NotFound("no ledger records".to_string()))?;

        self.base_reserve_stroops
            .store(ledger.base_reserve_in_stroops, Ordering::Relaxed);
        let reserve = self.base_reserve();
        info!(base_reserve = %reserve, "Base reserve refreshed");
        Ok(reserve)
    }

    async fn fetch_resource(&self, id: &ResourceId) -> LedgerResult<ClaimableResource> {
        debug!(resource_id = %id, "Fetching claimable balance");
        let raw: RawClaimableBalance = self.get_json(&format!("/claimable_balances/{id}")).await?;
        raw.try_into()
    }

    async fn fetch_spendable(&self, address: &Address) -> LedgerResult<Amount> {
        let account: RawAccount = self.get_json(&format!("/accounts/{address}")).await?;
        let native = account
            .balances
            .iter()
            .find(|b| b.asset_type == "native")
            .map(|b| b.balance.parse::<Amount>())
            .transpose()?
            .unwrap_or(Amount::ZERO);

        let minimum =
            Amount::new(self.base_reserve().inner() * Decimal::from(2 + account.subentry_count));
        Ok(native.saturating_sub(minimum))
    }

    async fn fetch_claimable_for(&self, address: &Address) -> LedgerResult<Vec<ClaimableResource>> {
        let page: Page<RawClaimableBalance> = self
            .get_json(&format!("/claimable_balances?claimant={address}&limit=200"))
            .await?;
        page.embedded
            .records
            .into_iter()
            .map(ClaimableResource::try_from)
            .collect()
    }

    async fn fetch_operations(
        &self,
        address: &Address,
        limit: usize,
    ) -> LedgerResult<Vec<OperationRecord>> {
        let page: Page<RawOperation> = self
            .get_json(&format!("/accounts/{address}/operations?order=desc&limit={limit}"))
            .await?;
        page.embedded
            .records
            .into_iter()
            .map(OperationRecord::try_from)
            .collect()
    }

    /// Submit a base64 transaction envelope.
    pub async fn submit_envelope(&self, envelope_xdr: &str) -> Result<TxHash, SubmitError> {
        let url = format!("{}/transactions", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[("tx", envelope_xdr)])
            .send()
            .await
            .map_err(|e| SubmitError::transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmitError::transport(format!("Failed to read response: {e}")))?;

        if status.is_success() {
            let parsed: SubmitResponse = serde_json::from_str(&body)
                .map_err(|e| SubmitError::transport(format!("Failed to parse response: {e}")))?;
            if !parsed.successful {
                return Err(SubmitError::new(FailureKind::Rejected, "transaction failed"));
            }
            return Ok(TxHash(parsed.hash));
        }

        Err(rejection_from_body(status, &body))
    }
}

/// Build a `SubmitError` from a Horizon problem document.
fn rejection_from_body(status: StatusCode, body: &str) -> SubmitError {
    let Ok(problem) = serde_json::from_str::<Problem>(body) else {
        return SubmitError::transport(format!("HTTP {status}: {body}"));
    };

    let codes = problem.extras.map(|e| e.result_codes).unwrap_or_default();
    let kind = classify_result_codes(codes.transaction.as_deref(), &codes.operations);

    let mut parts: Vec<String> = codes.transaction.into_iter().collect();
    parts.extend(codes.operations.into_iter().filter(|op| op != "op_success"));
    let reason = if parts.is_empty() {
        problem.title
    } else {
        parts.join(", ")
    };

    if status.is_server_error() {
        warn!(%status, reason = %reason, "Ledger submission server error");
        return SubmitError::transport(reason);
    }
    SubmitError::new(kind, reason)
}

impl LedgerQuery for HorizonClient {
    fn claimable_resource(&self, id: ResourceId) -> BoxFuture<'_, LedgerResult<ClaimableResource>> {
        Box::pin(async move { self.fetch_resource(&id).await })
    }

    fn spendable_balance(&self, address: Address) -> BoxFuture<'_, LedgerResult<Amount>> {
        Box::pin(async move { self.fetch_spendable(&address).await })
    }

    fn claimable_for(&self, address: Address) -> BoxFuture<'_, LedgerResult<Vec<ClaimableResource>>> {
        Box::pin(async move { self.fetch_claimable_for(&address).await })
    }

    fn recent_operations(
        &self,
        address: Address,
        limit: usize,
    ) -> BoxFuture<'_, LedgerResult<Vec<OperationRecord>>> {
        Box::pin(async move { self.fetch_operations(&address, limit).await })
    }
}

/// Builds and signs transaction envelopes.
///
/// Implemented outside this workspace by the key-holding collaborator. No
/// implementation ships here, so the binary races against the sandbox and
/// only reads from Horizon.
pub trait EnvelopeSigner: Send + Sync {
    /// Base64 envelope for a claim operation (dual-signed when sponsored).
    fn claim_envelope<'a>(
        &'a self,
        submission: &'a ClaimSubmission,
    ) -> BoxFuture<'a, Result<String, SubmitError>>;

    /// Base64 envelope for a native payment.
    fn transfer_envelope<'a>(
        &'a self,
        submission: &'a TransferSubmission,
    ) -> BoxFuture<'a, Result<String, SubmitError>>;
}

/// `LedgerSubmitter` over Horizon with an external envelope signer.
///
/// Seam for live submission: wire it into `RaceOrchestrator` together with an
/// [`EnvelopeSigner`] implementation.
pub struct HorizonSubmitter {
    client: Arc<HorizonClient>,
    signer: Arc<dyn EnvelopeSigner>,
}

impl HorizonSubmitter {
    pub fn new(client: Arc<HorizonClient>, signer: Arc<dyn EnvelopeSigner>) -> Self {
        Self { client, signer }
    }
}

impl LedgerSubmitter for HorizonSubmitter {
    fn submit_claim(
        &self,
        submission: ClaimSubmission,
    ) -> BoxFuture<'_, Result<ClaimReceipt, SubmitError>> {
        Box::pin(async move {
            let envelope = self.signer.claim_envelope(&submission).await?;
            let hash = self.client.submit_envelope(&envelope).await?;
            Ok(ClaimReceipt { hash, amount: None })
        })
    }

    fn submit_transfer(
        &self,
        submission: TransferSubmission,
    ) -> BoxFuture<'_, Result<TxHash, SubmitError>> {
        Box::pin(async move {
            let envelope = self.signer.transfer_envelope(&submission).await?;
            self.client.submit_envelope(&envelope).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimrace_core::{Fee, SecretPhrase, Signer};
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticSigner;

    impl EnvelopeSigner for StaticSigner {
        fn claim_envelope<'a>(
            &'a self,
            _submission: &'a ClaimSubmission,
        ) -> BoxFuture<'a, Result<String, SubmitError>> {
            Box::pin(async { Ok("CLAIMXDR".to_string()) })
        }

        fn transfer_envelope<'a>(
            &'a self,
            _submission: &'a TransferSubmission,
        ) -> BoxFuture<'a, Result<String, SubmitError>> {
            Box::pin(async { Ok("TRANSFERXDR".to_string()) })
        }
    }

    fn claim_submission() -> ClaimSubmission {
        let main = Signer::new(Address::new("GMAIN"), SecretPhrase::new("x"));
        ClaimSubmission {
            claimant: main.clone(),
            fee_payer: main,
            resource_id: ResourceId::new("00ab"),
            fee: Fee(3_200_000),
        }
    }

    #[tokio::test]
    async fn test_fetch_claimable_resource() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/claimable_balances/00ab"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "00ab",
                "asset": "native",
                "amount": "314.1592000",
                "claimants": [{
                    "destination": "GMAIN",
                    "predicate": {"not": {"abs_before": "2025-03-01T00:00:00Z", "abs_before_epoch": "1740787200"}}
                }]
            })))
            .mount(&server)
            .await;

        let client = HorizonClient::new(server.uri()).unwrap();
        let resource = client
            .claimable_resource(ResourceId::new("00ab"))
            .await
            .unwrap();

        assert_eq!(resource.amount, Amount::new(dec!(314.1592)));
        let unlock =
            claimrace_core::resolve_unlock_for(&resource, &Address::new("GMAIN")).unwrap();
        assert_eq!(unlock.timestamp(), 1_740_787_200);
    }

    #[tokio::test]
    async fn test_missing_resource_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/claimable_balances/dead"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HorizonClient::new(server.uri()).unwrap();
        let err = client
            .claimable_resource(ResourceId::new("dead"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_spendable_balance_uses_refreshed_reserve() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ledgers"))
            .and(query_param("order", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "_embedded": {"records": [{"base_reserve_in_stroops": 10_000_000}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/GMAIN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "subentry_count": 1,
                "balances": [
                    {"balance": "7.0000000", "asset_type": "credit_alphanum4"},
                    {"balance": "10.5000000", "asset_type": "native"}
                ]
            })))
            .mount(&server)
            .await;

        let client = HorizonClient::new(server.uri()).unwrap();
        assert_eq!(client.base_reserve(), Amount::new(dec!(0.49)));
        client.refresh_base_reserve().await.unwrap();

        // 10.5 - 1.0 * (2 + 1)
        let spendable = client.spendable_balance(Address::new("GMAIN")).await.unwrap();
        assert_eq!(spendable, Amount::new(dec!(7.5)));
    }

    #[tokio::test]
    async fn test_recent_operations_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/GMAIN/operations"))
            .and(query_param("order", "desc"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "_embedded": {"records": [
                    {
                        "id": "1002",
                        "type": "payment",
                        "transaction_hash": "bbb",
                        "created_at": "2025-03-01T00:00:07Z",
                        "amount": "312.1592000"
                    },
                    {
                        "id": "1001",
                        "type": "claim_claimable_balance",
                        "transaction_hash": "aaa",
                        "created_at": "2025-03-01T00:00:02Z",
                        "balance_id": "00ab"
                    },
                    {
                        "id": "1000",
                        "type": "create_account",
                        "transaction_hash": "999",
                        "created_at": "2025-02-01T00:00:00Z",
                        "starting_balance": "2.0000000"
                    }
                ]}
            })))
            .mount(&server)
            .await;

        let client = HorizonClient::new(server.uri()).unwrap();
        let ops = client
            .recent_operations(Address::new("GMAIN"), 5)
            .await
            .unwrap();

        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].kind, "payment");
        assert_eq!(ops[0].amount, Some(Amount::new(dec!(312.1592))));
        assert_eq!(ops[0].tx_hash, TxHash("bbb".to_string()));
        assert_eq!(ops[1].amount, None);
        assert_eq!(ops[1].created_at.timestamp(), 1_740_787_202);
        assert_eq!(ops[2].amount, Some(Amount::new(dec!(2))));
    }

    #[tokio::test]
    async fn test_recent_operations_unknown_account_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/GNONE/operations"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HorizonClient::new(server.uri()).unwrap();
        let err = client
            .recent_operations(Address::new("GNONE"), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_submit_success_returns_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transactions"))
            .and(body_string_contains("tx=CLAIMXDR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hash": "abc123", "successful": true
            })))
            .mount(&server)
            .await;

        let client = Arc::new(HorizonClient::new(server.uri()).unwrap());
        let submitter = HorizonSubmitter::new(client, Arc::new(StaticSigner));
        let receipt = submitter.submit_claim(claim_submission()).await.unwrap();
        assert_eq!(receipt.hash, TxHash("abc123".to_string()));
        assert_eq!(receipt.amount, None);
    }

    #[tokio::test]
    async fn test_submit_rejection_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transactions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "title": "Transaction Failed",
                "status": 400,
                "extras": {"result_codes": {"transaction": "tx_failed", "operations": ["op_does_not_exist"]}}
            })))
            .mount(&server)
            .await;

        let client = Arc::new(HorizonClient::new(server.uri()).unwrap());
        let submitter = HorizonSubmitter::new(client, Arc::new(StaticSigner));
        let err = submitter.submit_claim(claim_submission()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::AlreadyClaimed);
        assert_eq!(err.reason, "tx_failed, op_does_not_exist");
    }

    #[tokio::test]
    async fn test_submit_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transactions"))
            .respond_with(ResponseTemplate::new(504).set_body_string("gateway timeout"))
            .mount(&server)
            .await;

        let client = HorizonClient::new(server.uri()).unwrap();
        let err = client.submit_envelope("X").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Transport);
    }
}
