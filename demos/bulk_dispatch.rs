//! Tokenizes a small record set against a mocked vault: the client exchanges a signed assertion
//! once, then pushes the records in batches of two with the cached bearer token.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::{Value, json};
// self
use vault_broker::{
	_preludet::{service_account_json, test_reqwest_http_client},
	auth::{CachedToken, CredentialInput, Identity},
	batch::{Batch, BatchDispatcher, DispatchFuture, RequestOptions},
	client::VaultClient,
	error::BatchError,
	reqwest::{
		Client,
		header::{AUTHORIZATION, CONTENT_TYPE},
	},
};

struct TokenizeDispatcher {
	http: Client,
	endpoint: String,
}
impl BatchDispatcher<String> for TokenizeDispatcher {
	type Output = String;

	fn dispatch<'a>(
		&'a self,
		batch: &'a Batch<'a, String>,
		token: &'a CachedToken,
	) -> DispatchFuture<'a, Self::Output> {
		Box::pin(async move {
			let response = self
				.http
				.post(&self.endpoint)
				.header(AUTHORIZATION, token.authorization_header())
				.header(CONTENT_TYPE, "application/json")
				.body(json!({ "records": batch.records }).to_string())
				.send()
				.await
				.map_err(|e| BatchError::Transport { message: e.to_string() })?;
			let status = response.status();

			if status.as_u16() == 401 {
				return Err(BatchError::InvalidBearerToken);
			}
			if !status.is_success() {
				return Err(BatchError::Rejected {
					status: status.as_u16(),
					message: response.text().await.unwrap_or_default(),
				});
			}

			let bytes = response
				.bytes()
				.await
				.map_err(|e| BatchError::Transport { message: e.to_string() })?;
			let body = serde_json::from_slice::<Value>(&bytes)
				.map_err(|e| BatchError::Transport { message: e.to_string() })?;
			let tokens = body["tokens"].as_array().cloned().unwrap_or_default();

			Ok(tokens
				.into_iter()
				.map(|token| match token {
					Value::String(token) => Ok(token),
					other => Err(BatchError::Record { message: format!("unexpected token {other}") }),
				})
				.collect())
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/auth/sa/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"accessToken\":\"demo-access\",\"tokenType\":\"Bearer\",\"expiresIn\":900}");
		})
		.await;
	let _records_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/tokenize").header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"tokens\":[\"tok-a\",\"tok-b\"]}");
		})
		.await;
	let client = VaultClient::with_reqwest(test_reqwest_http_client());
	let identity = Identity::try_from(
		CredentialInput::default()
			.with_inline_json(service_account_json(&server.url("/v1/auth/sa/oauth/token")))
			.with_role("tokenizer"),
	)?;
	let dispatcher = TokenizeDispatcher {
		http: Client::new(),
		endpoint: server.url("/v1/tokenize"),
	};
	let records = ["4111-1111", "4222-2222", "4333-3333", "4444-4444"].map(String::from);
	let result =
		client.bulk(&identity, &records, &RequestOptions::new(2, 2)?, &Arc::new(dispatcher)).await?;

	for (index, token) in result.successes() {
		println!("Record {index} tokenized as {token}.");
	}

	assert_eq!(result.successes().count(), records.len());

	token_mock.assert_async().await;

	Ok(())
}
