//! Assertion-for-token exchange against the vault's auth endpoint.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{BEARER, CachedToken, SignedAssertion},
	error::{AuthError, ConfigError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Grant type sent alongside signed assertions.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const MESSAGE_PREVIEW_LIMIT: usize = 256;

/// Boxed future returned by [`TokenExchange::exchange`].
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<CachedToken>> + 'a + Send>>;

/// Trades a signed assertion for a bearer token.
///
/// Implementations issue exactly one request per call and never retry; retry policy belongs to
/// the token cache.
pub trait TokenExchange
where
	Self: Send + Sync,
{
	/// Exchanges `assertion` at its audience endpoint.
	fn exchange(&self, assertion: SignedAssertion) -> ExchangeFuture<'_>;
}

/// Maps transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into an error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) =>
				with_meta(AuthError::transport("I/O error while calling the token endpoint", inner), meta),
			HttpClientError::Other(message) => with_meta(
				AuthError::TransportFailure {
					message: format!("HTTP client error: {message}"),
					status: None,
					retry_after: None,
					source: None,
				},
				meta,
			),
			_ => with_meta(
				AuthError::TransportFailure {
					message: "unrecognized HTTP client error".into(),
					status: None,
					retry_after: None,
					source: None,
				},
				meta,
			),
		}
	}
}

/// [`TokenExchange`] over any [`TokenHttpClient`].
pub struct TokenExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client used for every exchange.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors.
	pub transport_mapper: Arc<M>,
}
impl<C, M> TokenExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an exchanger from a transport + mapper pair.
	pub fn with_http_client(http_client: impl Into<Arc<C>>, mapper: impl Into<Arc<M>>) -> Self {
		Self { http_client: http_client.into(), transport_mapper: mapper.into() }
	}
}
#[cfg(feature = "reqwest")]
impl TokenExchanger<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an exchanger backed by a default reqwest client.
	pub fn new() -> Self {
		Self::with_http_client(ReqwestHttpClient::default(), ReqwestTransportErrorMapper)
	}
}
#[cfg(feature = "reqwest")]
impl Default for TokenExchanger<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	fn default() -> Self {
		Self::new()
	}
}
impl<C, M> TokenExchange for TokenExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange(&self, assertion: SignedAssertion) -> ExchangeFuture<'_> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let request = build_request(&assertion)?;
			let handle = self.http_client.with_metadata(meta.clone());
			let response = handle.call(request).await.map_err(|err| {
				self.transport_mapper.map_transport_error(meta.take().as_ref(), err)
			})?;

			parse_response(&response, OffsetDateTime::now_utc())
		})
	}
}
impl<C, M> Debug for TokenExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenExchanger(..)")
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponseBody {
	access_token: String,
	#[serde(default)]
	token_type: String,
	expires_in: i64,
}

fn build_request(assertion: &SignedAssertion) -> Result<HttpRequest> {
	let mut body = serde_json::json!({
		"grant_type": JWT_BEARER_GRANT,
		"assertion": assertion.token().expose(),
	});

	if let Some(scope) = assertion.roles().scope_param() {
		body["scope"] = Value::String(scope);
	}

	oauth2::http::Request::builder()
		.method(Method::POST)
		.uri(assertion.audience().as_str())
		.header(CONTENT_TYPE, "application/json")
		.header(ACCEPT, "application/json")
		.body(body.to_string().into_bytes())
		.map_err(|e| ConfigError::from(e).into())
}

fn parse_response(response: &HttpResponse, now: OffsetDateTime) -> Result<CachedToken> {
	let status = response.status().as_u16();

	if !response.status().is_success() {
		return Err(AuthError::TokenExchangeRejected {
			status,
			message: server_message(response.body()),
		}
		.into());
	}

	let mut deserializer = serde_json::Deserializer::from_slice(response.body());
	let body: TokenResponseBody =
		serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			AuthError::InvalidTokenResponse {
				reason: format!("malformed body at `{}`", e.path()),
				status: Some(status),
				source: Some(Arc::new(e)),
			}
		})?;
	let invalid = |reason: &str| AuthError::InvalidTokenResponse {
		reason: reason.into(),
		status: Some(status),
		source: None,
	};

	if body.access_token.is_empty() {
		return Err(invalid("accessToken is empty").into());
	}
	if body.expires_in <= 0 {
		return Err(invalid("expiresIn must be positive").into());
	}

	let expires_at = now
		.checked_add(Duration::seconds(body.expires_in))
		.ok_or_else(|| invalid("expiresIn out of range"))?;
	let token_type = if body.token_type.is_empty() { BEARER.into() } else { body.token_type };

	Ok(CachedToken::new(body.access_token, token_type, expires_at))
}

fn server_message(body: &[u8]) -> String {
	if let Ok(value) = serde_json::from_slice::<Value>(body) {
		let candidates = [
			value.pointer("/error/message"),
			value.get("error_description"),
			value.get("message"),
			value.get("error"),
		];

		if let Some(message) = candidates.into_iter().flatten().find_map(Value::as_str) {
			return message.to_owned();
		}
	}

	let text = String::from_utf8_lossy(body);
	let text = text.trim();

	if text.is_empty() {
		return "empty response body".into();
	}

	text.chars().take(MESSAGE_PREVIEW_LIMIT).collect()
}

fn with_meta(error: AuthError, meta: Option<&ResponseMetadata>) -> Error {
	match error {
		AuthError::TransportFailure { message, status, retry_after, source } =>
			AuthError::TransportFailure {
				message,
				status: status.or_else(|| meta.and_then(|value| value.status)),
				retry_after: retry_after.or_else(|| meta.and_then(|value| value.retry_after)),
				source,
			}
			.into(),
		other => other.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	let message = if err.is_timeout() {
		"request timed out while calling the token endpoint"
	} else if err.is_connect() {
		"could not connect to the token endpoint"
	} else {
		"network error while calling the token endpoint"
	};

	with_meta(AuthError::transport(message, err), meta)
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::StatusCode;
	use time::macros;
	// self
	use super::*;

	fn response(status: u16, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() =
			StatusCode::from_u16(status).expect("Fixture status should be valid.");

		response
	}

	#[test]
	fn success_body_becomes_cached_token() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let token = parse_response(
			&response(200, "{\"accessToken\":\"at-1\",\"tokenType\":\"Bearer\",\"expiresIn\":3600}"),
			now,
		)
		.expect("Well-formed body should parse.");

		assert_eq!(token.value.expose(), "at-1");
		assert_eq!(token.token_type, "Bearer");
		assert_eq!(token.expires_at, Some(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[test]
	fn non_success_status_is_rejected_with_server_message() {
		let err = parse_response(
			&response(401, "{\"error\":{\"message\":\"Invalid key\",\"http_code\":401}}"),
			OffsetDateTime::now_utc(),
		)
		.expect_err("401 must be rejected.");

		match err {
			Error::Auth(AuthError::TokenExchangeRejected { status, message }) => {
				assert_eq!(status, 401);
				assert_eq!(message, "Invalid key");
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn malformed_bodies_report_the_json_path() {
		let err = parse_response(
			&response(200, "{\"accessToken\":\"at\",\"expiresIn\":\"soon\"}"),
			OffsetDateTime::now_utc(),
		)
		.expect_err("String expiry must be rejected.");

		assert!(
			matches!(err, Error::Auth(AuthError::InvalidTokenResponse { ref reason, .. }) if reason.contains("expiresIn"))
		);

		let err = parse_response(
			&response(200, "{\"accessToken\":\"at\",\"expiresIn\":0}"),
			OffsetDateTime::now_utc(),
		)
		.expect_err("Zero expiry must be rejected.");

		assert!(matches!(err, Error::Auth(AuthError::InvalidTokenResponse { source: None, .. })));
	}

	#[test]
	fn huge_expiry_is_rejected_instead_of_overflowing() {
		let err = parse_response(
			&response(200, "{\"accessToken\":\"at\",\"tokenType\":\"Bearer\",\"expiresIn\":9000000000000}"),
			OffsetDateTime::now_utc(),
		)
		.expect_err("Expiry past the representable range must be rejected.");

		assert!(matches!(
			err,
			Error::Auth(AuthError::InvalidTokenResponse { ref reason, status: Some(200), .. })
				if reason == "expiresIn out of range"
		));
	}

	#[test]
	fn server_message_falls_back_to_body_preview() {
		assert_eq!(server_message(b"{\"message\":\"nope\"}"), "nope");
		assert_eq!(server_message(b"{\"error\":\"invalid_grant\"}"), "invalid_grant");
		assert_eq!(server_message(b"  gateway down \n"), "gateway down");
		assert_eq!(server_message(b""), "empty response body");
		assert_eq!(server_message("x".repeat(1000).as_bytes()).len(), MESSAGE_PREVIEW_LIMIT);
	}

	#[test]
	fn transport_failures_pick_up_metadata() {
		let meta = ResponseMetadata { status: Some(503), retry_after: Some(Duration::seconds(2)) };
		let err = with_meta(
			AuthError::TransportFailure {
				message: "reset".into(),
				status: None,
				retry_after: None,
				source: None,
			},
			Some(&meta),
		);

		assert!(matches!(
			err,
			Error::Auth(AuthError::TransportFailure { status: Some(503), retry_after: Some(_), .. })
		));
	}
}
