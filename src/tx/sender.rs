//! Submission engine: detect, rewrite, then submit with escalating gas until a
//! receipt reports success or the attempt budget runs out

use super::gas::{format_gwei, GasPolicy};
use crate::chain::{ContractAddress, ReceiptStatus};
use crate::config::{Settings, SniperConfig};
use crate::context::SniperContext;
use crate::error::{SniperError, SniperResult};
use crate::indexer::{PayloadSource, PollBudget};
use crate::payload::{CallPayload, CalldataRewriter};

use ethers::prelude::*;
use ethers::signers::Signer;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Detecting,
    Submitting,
    Confirming,
    Succeeded,
    Exhausted,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Terminal result of a run that got past detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnipeOutcome {
    Succeeded { tx_hash: H256, attempt: u32 },
    Exhausted { attempts: u32 },
}

impl SnipeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SnipeOutcome::Succeeded { .. })
    }
}

/// One broadcast transaction
#[derive(Debug, Clone)]
pub struct Attempt {
    pub number: u32,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub nonce: U256,
    pub tx_hash: H256,
}

/// How a single attempt ended
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(H256),
    OnChainFailure(H256),
    TransientError(SniperError),
}

impl AttemptOutcome {
    fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::OnChainFailure(_) => "on_chain_failure",
            AttemptOutcome::TransientError(_) => "transient_error",
        }
    }
}

pub struct SubmissionEngine {
    ctx: Arc<SniperContext>,
    source: PayloadSource,
    rewriter: CalldataRewriter,
    gas: GasPolicy,
    budget: PollBudget,
    config: SniperConfig,
    beneficiary: Address,
}

impl SubmissionEngine {
    pub fn new(ctx: Arc<SniperContext>, settings: &Settings, beneficiary: Address) -> Self {
        let source = PayloadSource::new(ctx.indexer.clone(), ctx.clock.clone(), &settings.indexer);
        let rewriter = CalldataRewriter::new(ctx.node.clone());

        Self {
            ctx,
            source,
            rewriter,
            gas: GasPolicy::new(&settings.gas),
            budget: PollBudget::from_config(&settings.indexer),
            config: settings.sniper.clone(),
            beneficiary,
        }
    }

    /// Run the whole pipeline against `contract`, paying `value` wei per attempt.
    ///
    /// Detection failures are returned as errors before any attempt is made.
    pub async fn snipe(
        &self,
        contract: &ContractAddress,
        value: U256,
    ) -> SniperResult<SnipeOutcome> {
        let mut state = EngineState::Idle;
        transition(&mut state, EngineState::Detecting);

        let payload = match self.detect(contract).await {
            Ok(payload) => payload,
            Err(e) => {
                transition(&mut state, EngineState::Exhausted);
                error!("Detection failed, no attempts made: {}", e);
                crate::metrics::record_snipe_result("detection_failed");
                return Err(e);
            }
        };

        let max_attempts = self.config.max_attempts;
        debug!(
            "Payload ready, up to {} attempts at {}..{} gwei",
            max_attempts,
            format_gwei(self.gas.price_for_attempt(1)),
            format_gwei(self.gas.price_ceiling())
        );
        for number in 1..=max_attempts {
            transition(&mut state, EngineState::Submitting);

            let outcome = match self.submit(number, contract, &payload, value).await {
                Ok(attempt) => {
                    info!(
                        "Attempt {}/{} broadcast: {:?} (nonce {}, gas {} @ {} gwei)",
                        number,
                        max_attempts,
                        attempt.tx_hash,
                        attempt.nonce,
                        attempt.gas_limit,
                        format_gwei(attempt.gas_price)
                    );
                    transition(&mut state, EngineState::Confirming);
                    self.confirm(&attempt).await
                }
                Err(e) => AttemptOutcome::TransientError(e),
            };
            crate::metrics::record_attempt(outcome.label());

            match outcome {
                AttemptOutcome::Success(tx_hash) => {
                    transition(&mut state, EngineState::Succeeded);
                    info!("Mint succeeded on attempt {}: {:?}", number, tx_hash);
                    crate::metrics::record_snipe_result("succeeded");
                    return Ok(SnipeOutcome::Succeeded {
                        tx_hash,
                        attempt: number,
                    });
                }
                AttemptOutcome::OnChainFailure(tx_hash) => {
                    warn!("Attempt {} reverted on chain: {:?}", number, tx_hash);
                }
                AttemptOutcome::TransientError(e) if e.is_retryable() => {
                    warn!("Attempt {} failed: {}", number, e);
                }
                AttemptOutcome::TransientError(e) => {
                    error!("Attempt {} failed with unexpected error: {}", number, e);
                }
            }

            self.ctx
                .clock
                .sleep(Duration::from_millis(self.config.attempt_pause_ms))
                .await;
        }

        transition(&mut state, EngineState::Exhausted);
        crate::metrics::record_snipe_result("exhausted");
        Ok(SnipeOutcome::Exhausted {
            attempts: max_attempts,
        })
    }

    /// Find the latest transaction and redirect its payload to the beneficiary
    async fn detect(&self, contract: &ContractAddress) -> SniperResult<CallPayload> {
        let tx_hash = self.source.find_latest_transaction(contract, self.budget).await?;
        self.rewriter.rewrite_payload(tx_hash, self.beneficiary).await
    }

    /// Build, sign and broadcast attempt `number`
    async fn submit(
        &self,
        number: u32,
        contract: &ContractAddress,
        payload: &CallPayload,
        value: U256,
    ) -> SniperResult<Attempt> {
        let node = self.ctx.node.as_ref();
        let operator = self.ctx.operator();

        let nonce = node.pending_nonce(operator).await?;
        let gas_limit = self
            .gas
            .limit_for(node, operator, contract, payload, value)
            .await;
        let gas_price = self.gas.price_for_attempt(number);

        let tx: TypedTransaction = TransactionRequest::new()
            .to(contract.address())
            .from(operator)
            .data(payload.bytes().clone())
            .nonce(nonce)
            .gas(gas_limit)
            .gas_price(gas_price)
            .value(value)
            .chain_id(self.ctx.wallet.chain_id())
            .into();

        let signature = self
            .ctx
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| SniperError::Transaction(format!("Signing failed: {}", e)))?;
        let raw = tx.rlp_signed(&signature);

        let tx_hash = node.send_raw_transaction(raw).await?;
        crate::metrics::record_broadcast();

        Ok(Attempt {
            number,
            gas_price,
            gas_limit,
            nonce,
            tx_hash,
        })
    }

    /// Look the receipt up, retrying lookup errors but never a reported failure
    async fn confirm(&self, attempt: &Attempt) -> AttemptOutcome {
        // At least one lookup per broadcast, whatever the config says
        let retries = self.config.receipt_retries.max(1);
        let timeout = Duration::from_secs(self.config.receipt_timeout_secs);
        let mut last_error = None;

        for lookup in 1..=retries {
            match self.ctx.node.wait_for_receipt(attempt.tx_hash, timeout).await {
                Ok(ReceiptStatus::Success) => return AttemptOutcome::Success(attempt.tx_hash),
                Ok(ReceiptStatus::Reverted) => {
                    return AttemptOutcome::OnChainFailure(attempt.tx_hash)
                }
                Err(e) => {
                    debug!(
                        "Receipt lookup {}/{} for attempt {} failed: {}",
                        lookup, retries, attempt.number, e
                    );
                    last_error = Some(e);
                    if lookup < retries {
                        self.ctx
                            .clock
                            .sleep(Duration::from_millis(self.config.receipt_retry_pause_ms))
                            .await;
                    }
                }
            }
        }

        AttemptOutcome::TransientError(SniperError::Receipt {
            tx_hash: format!("{:?}", attempt.tx_hash),
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_default(),
        })
    }
}

fn transition(state: &mut EngineState, next: EngineState) {
    debug!("Engine state {} -> {}", state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockNodeClient;
    use crate::clock::ManualClock;
    use crate::context::parse_wallet;
    use crate::indexer::{IndexedTransaction, IndexerError, MockIndexerClient};
    use crate::tx::gas::gwei;
    use ethers::utils::rlp;
    use std::sync::Mutex;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const CONTRACT: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
    const DETECTED: &str = "0x111111111111111111111111111111111111111111111111111111111111dead";

    /// Second argument of the detected `mint(address,uint256)` call
    fn quantity_word() -> [u8; 32] {
        let mut word = [0u8; 32];
        word[31] = 1;
        word
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.node.rpc_url = "http://localhost:8545".to_string();
        settings
    }

    fn indexer_with_hash() -> MockIndexerClient {
        let mut indexer = MockIndexerClient::new();
        indexer.expect_latest_transactions().returning(|_, _| {
            Ok(vec![IndexedTransaction {
                hash: DETECTED.to_string(),
            }])
        });
        indexer
    }

    /// Node mock that serves the detected calldata, nonces and gas estimates;
    /// broadcasts are recorded and receipts come from `receipts`
    fn node_with(
        sent: Arc<Mutex<Vec<Bytes>>>,
        receipts: Vec<SniperResult<ReceiptStatus>>,
    ) -> MockNodeClient {
        let mut node = MockNodeClient::new();
        node.expect_transaction_input().returning(|_| {
            let mut data = vec![0x40, 0xc1, 0x0f, 0x19];
            data.extend_from_slice(&[0xaa; 32]);
            data.extend_from_slice(&quantity_word());
            Ok(Some(Bytes::from(data)))
        });
        node.expect_pending_nonce()
            .returning(|_| Ok(U256::from(7u64)));
        node.expect_estimate_gas()
            .returning(|_| Ok(U256::from(90_000u64)));

        let counter = sent.clone();
        node.expect_send_raw_transaction().returning(move |raw| {
            let mut sent = counter.lock().unwrap();
            sent.push(raw);
            Ok(H256::from_low_u64_be(sent.len() as u64))
        });

        let mut receipts = receipts.into_iter();
        node.expect_wait_for_receipt().returning(move |_, _| {
            receipts.next().unwrap_or(Ok(ReceiptStatus::Reverted))
        });
        node
    }

    fn engine(
        node: MockNodeClient,
        indexer: MockIndexerClient,
        clock: Arc<ManualClock>,
        settings: &Settings,
    ) -> SubmissionEngine {
        let wallet = parse_wallet(KEY).unwrap().with_chain_id(10143u64);
        let beneficiary = wallet.address();
        let ctx = SniperContext::new(Arc::new(node), Arc::new(indexer), wallet, clock);
        SubmissionEngine::new(Arc::new(ctx), settings, beneficiary)
    }

    fn contract() -> ContractAddress {
        ContractAddress::parse(CONTRACT).unwrap()
    }

    fn decode(raw: &Bytes) -> Transaction {
        rlp::decode::<Transaction>(raw.as_ref()).unwrap()
    }

    #[tokio::test]
    async fn test_stops_after_first_success() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let node = node_with(
            sent.clone(),
            vec![
                Ok(ReceiptStatus::Reverted),
                Ok(ReceiptStatus::Reverted),
                Ok(ReceiptStatus::Success),
            ],
        );
        let clock = Arc::new(ManualClock::new());
        let engine = engine(node, indexer_with_hash(), clock, &settings());

        let outcome = engine.snipe(&contract(), U256::zero()).await.unwrap();

        assert_eq!(
            outcome,
            SnipeOutcome::Succeeded {
                tx_hash: H256::from_low_u64_be(3),
                attempt: 3
            }
        );
        assert_eq!(sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_zero_receipt_retries_still_confirms_once() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let node = node_with(sent.clone(), vec![Ok(ReceiptStatus::Success)]);
        let clock = Arc::new(ManualClock::new());
        let mut settings = settings();
        settings.sniper.receipt_retries = 0;
        let engine = engine(node, indexer_with_hash(), clock, &settings);

        let outcome = engine.snipe(&contract(), U256::zero()).await.unwrap();

        assert_eq!(
            outcome,
            SnipeOutcome::Succeeded {
                tx_hash: H256::from_low_u64_be(1),
                attempt: 1
            }
        );
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausts_attempt_budget() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let node = node_with(sent.clone(), vec![]);
        let clock = Arc::new(ManualClock::new());
        let mut settings = settings();
        settings.sniper.max_attempts = 4;
        let engine = engine(node, indexer_with_hash(), clock.clone(), &settings);

        let outcome = engine.snipe(&contract(), U256::zero()).await.unwrap();

        assert_eq!(outcome, SnipeOutcome::Exhausted { attempts: 4 });
        assert_eq!(sent.lock().unwrap().len(), 4);
        // 50ms pause after every attempt
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(50); 4]);
    }

    #[tokio::test]
    async fn test_signed_transactions_escalate_gas_and_redirect_payload() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let node = node_with(sent.clone(), vec![]);
        let clock = Arc::new(ManualClock::new());
        let mut settings = settings();
        settings.sniper.max_attempts = 3;
        let engine = engine(node, indexer_with_hash(), clock, &settings);
        let operator = engine.ctx.operator();
        let value = U256::from(1_000u64);

        engine.snipe(&contract(), value).await.unwrap();

        let sent = sent.lock().unwrap();
        let prices: Vec<U256> = sent.iter().map(|raw| decode(raw).gas_price.unwrap()).collect();
        assert_eq!(
            prices,
            vec![gwei(60), gwei(70), gwei(80)]
        );

        let first = decode(&sent[0]);
        assert_eq!(first.to, Some(contract().address()));
        assert_eq!(first.nonce, U256::from(7u64));
        assert_eq!(first.gas, U256::from(90_000u64));
        assert_eq!(first.value, value);
        assert_eq!(&first.input[..4], &[0x40, 0xc1, 0x0f, 0x19]);
        assert_eq!(&first.input[4..16], &[0u8; 12]);
        assert_eq!(&first.input[16..36], operator.as_bytes());
        assert_eq!(&first.input[36..], &quantity_word()[..]);
    }

    #[tokio::test]
    async fn test_detection_failure_consumes_no_attempts() {
        let mut indexer = MockIndexerClient::new();
        indexer
            .expect_latest_transactions()
            .times(1)
            .returning(|_, _| Err(IndexerError::Forbidden));

        let mut node = MockNodeClient::new();
        node.expect_send_raw_transaction().times(0);
        node.expect_pending_nonce().times(0);

        let clock = Arc::new(ManualClock::new());
        let engine = engine(node, indexer, clock, &settings());

        let result = engine.snipe(&contract(), U256::zero()).await;
        assert!(matches!(result, Err(SniperError::IndexerForbidden)));
    }

    #[tokio::test]
    async fn test_missing_payload_consumes_no_attempts() {
        let mut node = MockNodeClient::new();
        node.expect_transaction_input().returning(|_| Ok(None));
        node.expect_send_raw_transaction().times(0);

        let clock = Arc::new(ManualClock::new());
        let engine = engine(node, indexer_with_hash(), clock, &settings());

        let result = engine.snipe(&contract(), U256::zero()).await;
        assert!(matches!(result, Err(SniperError::MissingPayload { .. })));
    }

    #[tokio::test]
    async fn test_receipt_errors_retry_then_move_on() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let timeout = || {
            Err(SniperError::Timeout {
                operation: "receipt".to_string(),
            })
        };
        let node = node_with(
            sent.clone(),
            vec![
                timeout(),
                timeout(),
                timeout(),
                timeout(),
                Ok(ReceiptStatus::Success),
            ],
        );
        let clock = Arc::new(ManualClock::new());
        let engine = engine(node, indexer_with_hash(), clock.clone(), &settings());

        let outcome = engine.snipe(&contract(), U256::zero()).await.unwrap();

        // Attempt 1 used all three lookups, attempt 2 succeeded on its second lookup
        assert_eq!(
            outcome,
            SnipeOutcome::Succeeded {
                tx_hash: H256::from_low_u64_be(2),
                attempt: 2
            }
        );
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_millis(50),
                Duration::from_secs(1),
            ]
        );
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_not_polled_again() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut node = MockNodeClient::new();
        node.expect_transaction_input()
            .returning(|_| Ok(Some(Bytes::from(vec![0x12, 0x34, 0x56, 0x78]))));
        node.expect_pending_nonce().returning(|_| Ok(U256::zero()));
        node.expect_estimate_gas()
            .returning(|_| Err(SniperError::GasEstimation("reverted".into())));
        let counter = sent.clone();
        node.expect_send_raw_transaction().returning(move |raw| {
            counter.lock().unwrap().push(raw);
            Ok(H256::repeat_byte(0x22))
        });
        node.expect_wait_for_receipt()
            .times(2)
            .returning(|_, _| Ok(ReceiptStatus::Reverted));

        let clock = Arc::new(ManualClock::new());
        let mut settings = settings();
        settings.sniper.max_attempts = 2;
        let engine = engine(node, indexer_with_hash(), clock, &settings);

        let outcome = engine.snipe(&contract(), U256::zero()).await.unwrap();
        assert_eq!(outcome, SnipeOutcome::Exhausted { attempts: 2 });

        // Estimation failure fell back to the default limit
        let first = decode(&sent.lock().unwrap()[0]);
        assert_eq!(first.gas, U256::from(100_000u64));
    }

    #[tokio::test]
    async fn test_broadcast_errors_do_not_abort_the_loop() {
        let mut node = MockNodeClient::new();
        node.expect_transaction_input()
            .returning(|_| Ok(Some(Bytes::from(vec![0x12, 0x34, 0x56, 0x78]))));
        node.expect_pending_nonce().returning(|_| Ok(U256::zero()));
        node.expect_estimate_gas()
            .returning(|_| Ok(U256::from(60_000u64)));
        let mut calls = 0;
        node.expect_send_raw_transaction()
            .times(2)
            .returning(move |_| {
                calls += 1;
                if calls == 1 {
                    Err(SniperError::Broadcast("nonce too low".into()))
                } else {
                    Ok(H256::repeat_byte(0x33))
                }
            });
        node.expect_wait_for_receipt()
            .times(1)
            .returning(|_, _| Ok(ReceiptStatus::Success));

        let clock = Arc::new(ManualClock::new());
        let engine = engine(node, indexer_with_hash(), clock, &settings());

        let outcome = engine.snipe(&contract(), U256::zero()).await.unwrap();
        assert_eq!(
            outcome,
            SnipeOutcome::Succeeded {
                tx_hash: H256::repeat_byte(0x33),
                attempt: 2
            }
        );
    }

    #[tokio::test]
    async fn test_nonce_lookup_failure_is_a_failed_attempt() {
        let mut node = MockNodeClient::new();
        node.expect_transaction_input()
            .returning(|_| Ok(Some(Bytes::from(vec![0x12, 0x34, 0x56, 0x78]))));
        node.expect_pending_nonce()
            .times(3)
            .returning(|_| Err(SniperError::NodeConnection("connection reset".into())));
        node.expect_send_raw_transaction().times(0);

        let clock = Arc::new(ManualClock::new());
        let mut settings = settings();
        settings.sniper.max_attempts = 3;
        let engine = engine(node, indexer_with_hash(), clock, &settings);

        let outcome = engine.snipe(&contract(), U256::zero()).await.unwrap();
        assert_eq!(outcome, SnipeOutcome::Exhausted { attempts: 3 });
        assert!(!outcome.is_success());
    }
}
