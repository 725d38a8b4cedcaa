//! Vault SDK core: single-flight bearer tokens and concurrency-bounded batch dispatch.
//!
//! A [`client::VaultClient`] owns a [`cache::TokenCache`] that turns an [`auth::Identity`] into a
//! bearer token (resolving, signing, and exchanging at most once per expiry cycle) and then pushes
//! large record sets through a caller-supplied [`batch::BatchDispatcher`] in bounded chunks,
//! returning one ordered [`batch::AggregatedResult`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod batch;
pub mod cache;
pub mod client;
pub mod error;
pub mod exchange;
pub mod http;
pub mod obs;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers shared by integration tests and demos.

	pub use crate::_prelude::*;

	// self
	use crate::{
		cache::{CacheConfig, TokenCache},
		client::VaultClient,
		exchange::{ReqwestTransportErrorMapper, TokenExchanger},
		http::ReqwestHttpClient,
	};

	/// PKCS#8 RSA private key used to sign assertions in tests.
	pub const TEST_PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/service_account_key.pem");
	/// Public half of [`TEST_PRIVATE_KEY_PEM`].
	pub const TEST_PUBLIC_KEY_PEM: &str = include_str!("../tests/fixtures/service_account_pub.pem");

	/// Exchanger type used by reqwest-backed integration tests.
	pub type ReqwestTestExchanger = TokenExchanger<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Renders a service-account credential document pointing at `token_uri`.
	pub fn service_account_json(token_uri: &str) -> String {
		serde_json::json!({
			"clientID": "test-client",
			"keyID": "test-key",
			"tokenURI": token_uri,
			"privateKey": TEST_PRIVATE_KEY_PEM,
		})
		.to_string()
	}

	/// Constructs a [`VaultClient`] whose cache talks to the token endpoint over the insecure
	/// test transport.
	pub fn build_reqwest_test_client(config: CacheConfig) -> VaultClient {
		let exchanger: ReqwestTestExchanger =
			TokenExchanger::with_http_client(test_reqwest_http_client(), ReqwestTransportErrorMapper);

		VaultClient::new(Arc::new(TokenCache::new(Arc::new(exchanger)).with_config(config)))
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
