// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use vault_broker::{
	_preludet::*,
	auth::{BEARER, CachedToken, CredentialInput, Identity, SignedAssertion},
	batch::{
		AggregateStatus, Batch, BatchDispatcher, CancelSignal, DispatchFuture, RequestOptions,
	},
	cache::TokenCache,
	client::VaultClient,
	error::{BatchError, CredentialError},
	exchange::{ExchangeFuture, TokenExchange},
};

const TOKEN_URI: &str = "https://vault.example.com/v1/auth/sa/oauth/token";
const RECORDS: [&str; 5] = ["a", "b", "c", "d", "e"];

#[derive(Default)]
struct CountingExchanger(AtomicUsize);
impl TokenExchange for CountingExchanger {
	fn exchange(&self, _: SignedAssertion) -> ExchangeFuture<'_> {
		let call = self.0.fetch_add(1, Ordering::SeqCst) + 1;

		Box::pin(async move {
			Ok(CachedToken::new(
				format!("access-{call}"),
				BEARER,
				OffsetDateTime::now_utc() + Duration::minutes(15),
			))
		})
	}
}

#[derive(Default)]
struct EchoDispatcher {
	fail_start: Option<usize>,
	reject_token: Option<&'static str>,
	cancel_at: Option<(usize, CancelSignal)>,
	delay: Option<std::time::Duration>,
	calls: AtomicUsize,
	seen_tokens: Mutex<Vec<String>>,
}
impl EchoDispatcher {
	fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl BatchDispatcher<&'static str> for EchoDispatcher {
	type Output = String;

	fn dispatch<'a>(
		&'a self,
		batch: &'a Batch<'a, &'static str>,
		token: &'a CachedToken,
	) -> DispatchFuture<'a, Self::Output> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.seen_tokens.lock().push(token.value.expose().to_owned());

			if let Some((start, cancel)) = &self.cancel_at
				&& *start == batch.start_index
			{
				cancel.cancel();
			}
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			if self.reject_token.is_some_and(|rejected| token.value.expose().starts_with(rejected)) {
				return Err(BatchError::InvalidBearerToken);
			}
			if self.fail_start == Some(batch.start_index) {
				return Err(BatchError::Rejected { status: 500, message: "upstream".into() });
			}

			Ok(batch.records.iter().map(|record| Ok(record.to_string())).collect())
		})
	}
}

fn api_key_identity() -> Identity {
	Identity::try_from(CredentialInput::default().with_api_key("sky-api-key"))
		.expect("API key identity should be valid.")
}

fn service_identity() -> Identity {
	Identity::try_from(CredentialInput::default().with_inline_json(service_account_json(TOKEN_URI)))
		.expect("Service-account identity should be valid.")
}

fn client(exchanger: Arc<CountingExchanger>) -> VaultClient {
	VaultClient::new(Arc::new(TokenCache::new(exchanger)))
}

fn options(batch_size: i64, concurrency_limit: i64) -> RequestOptions {
	RequestOptions::new(batch_size, concurrency_limit).expect("Options fixture should be valid.")
}

#[tokio::test]
async fn all_batches_succeed_in_order() {
	let dispatcher = EchoDispatcher::default();
	let result = client(Default::default())
		.bulk(&api_key_identity(), &RECORDS, &options(2, 1), &dispatcher)
		.await
		.expect("Bulk call should complete.");

	assert!(result.is_success());
	assert!(!result.cancelled);
	assert_eq!(dispatcher.calls(), 3);
	assert_eq!(
		result.results.into_iter().collect::<std::result::Result<Vec<_>, _>>().expect("No failures."),
		RECORDS
	);
	assert!(dispatcher.seen_tokens.lock().iter().all(|token| token == "sky-api-key"));
}

#[tokio::test]
async fn failing_batch_yields_partial_success() {
	let dispatcher = EchoDispatcher { fail_start: Some(2), ..Default::default() };
	let result = client(Default::default())
		.bulk(&api_key_identity(), &RECORDS, &options(2, 1), &dispatcher)
		.await
		.expect("Batch failures never abort the call.");

	match &result.status {
		AggregateStatus::PartialSuccess { failures } => {
			assert_eq!(failures.iter().map(|(index, _)| *index).collect::<Vec<_>>(), [2, 3]);
			assert!(failures.iter().all(|(_, err)| matches!(err, BatchError::Rejected { .. })));
		},
		AggregateStatus::Success => panic!("Second batch failed; status must be partial."),
	}

	assert_eq!(
		result.successes().map(|(index, value)| (index, value.as_str())).collect::<Vec<_>>(),
		[(0, "a"), (1, "b"), (4, "e")]
	);
}

#[tokio::test]
async fn parallel_dispatch_keeps_input_order() {
	let records = (0..40).map(|index| &*format!("r{index}").leak()).collect::<Vec<&'static str>>();
	let dispatcher = EchoDispatcher {
		delay: Some(std::time::Duration::from_millis(5)),
		..Default::default()
	};
	let result = client(Default::default())
		.bulk(&api_key_identity(), &records, &options(3, 4), &dispatcher)
		.await
		.expect("Bulk call should complete.");

	assert!(result.is_success());
	assert_eq!(dispatcher.calls(), 14);
	assert_eq!(
		result.successes().map(|(_, value)| value.as_str()).collect::<Vec<_>>(),
		records
	);
}

#[tokio::test]
async fn rejected_bearer_is_refreshed_once() {
	let exchanger = Arc::new(CountingExchanger::default());
	let dispatcher = EchoDispatcher { reject_token: Some("access-1"), ..Default::default() };
	let result = client(exchanger.clone())
		.bulk(&service_identity(), &RECORDS, &options(2, 1), &dispatcher)
		.await
		.expect("Bulk call should complete.");

	assert!(result.is_success());
	assert_eq!(exchanger.0.load(Ordering::SeqCst), 2, "One initial exchange plus one refresh.");
	assert_eq!(
		*dispatcher.seen_tokens.lock(),
		["access-1", "access-2", "access-2", "access-2"]
	);
}

#[tokio::test]
async fn persistent_bearer_rejection_fails_each_batch() {
	let exchanger = Arc::new(CountingExchanger::default());
	let dispatcher = EchoDispatcher { reject_token: Some("access-"), ..Default::default() };
	let result = client(exchanger)
		.bulk(&service_identity(), &RECORDS[..2], &options(2, 1), &dispatcher)
		.await
		.expect("Bulk call should complete.");

	assert_eq!(dispatcher.calls(), 2, "The batch is re-dispatched exactly once.");
	assert_eq!(result.failed_indices(), [0, 1]);
	assert!(matches!(result.results[0], Err(BatchError::InvalidBearerToken)));
}

#[tokio::test]
async fn cancellation_reports_undispatched_batches() {
	let cancel = CancelSignal::default();
	let dispatcher = EchoDispatcher { cancel_at: Some((2, cancel.clone())), ..Default::default() };
	let result = client(Default::default())
		.bulk_with_cancel(&api_key_identity(), &RECORDS, &options(2, 1), &dispatcher, &cancel)
		.await
		.expect("Cancelled calls still aggregate.");

	assert!(result.cancelled);
	assert_eq!(dispatcher.calls(), 2);
	assert_eq!(result.failed_indices(), [4]);
	assert!(matches!(result.results[4], Err(BatchError::Cancelled)));
	assert_eq!(result.successes().count(), 4, "In-flight batches are incorporated.");
}

#[tokio::test]
async fn dispatch_timeout_fails_slow_batches() {
	let dispatcher = EchoDispatcher {
		delay: Some(std::time::Duration::from_millis(200)),
		..Default::default()
	};
	let options = options(5, 1).with_dispatch_timeout(Duration::milliseconds(10));
	let result = client(Default::default())
		.bulk(&api_key_identity(), &RECORDS, &options, &dispatcher)
		.await
		.expect("Timeouts are batch failures.");

	assert_eq!(result.failed_indices(), [0, 1, 2, 3, 4]);
	assert!(matches!(result.results[0], Err(BatchError::Timeout { .. })));
}

#[tokio::test]
async fn empty_input_skips_token_and_dispatch() {
	let dispatcher = EchoDispatcher::default();
	let identity = Identity::try_from(
		CredentialInput::default().with_file_path("/nonexistent/vault-broker/credentials.json"),
	)
	.expect("File identity should be valid.");
	let result = client(Default::default())
		.bulk::<&'static str, _>(&identity, &[], &options(2, 1), &dispatcher)
		.await
		.expect("Empty input is a vacuous success.");

	assert!(result.is_success());
	assert!(result.results.is_empty());
	assert_eq!(dispatcher.calls(), 0);
}

#[tokio::test]
async fn credential_errors_abort_before_dispatch() {
	let dispatcher = EchoDispatcher::default();
	let identity = Identity::try_from(
		CredentialInput::default().with_file_path("/nonexistent/vault-broker/credentials.json"),
	)
	.expect("File identity should be valid.");
	let err = client(Default::default())
		.bulk(&identity, &RECORDS, &options(2, 1), &dispatcher)
		.await
		.expect_err("Unreadable credentials abort the call.");

	assert!(matches!(err, Error::Credential(CredentialError::Unreadable { .. })));
	assert_eq!(dispatcher.calls(), 0);
}

#[test]
fn blocking_facade_runs_without_an_ambient_runtime() {
	let dispatcher = EchoDispatcher { fail_start: Some(4), ..Default::default() };
	let result = client(Default::default())
		.bulk_blocking(&api_key_identity(), &RECORDS, &options(2, 2), &dispatcher)
		.expect("Blocking call should complete.");

	assert_eq!(result.failed_indices(), [4]);
}
