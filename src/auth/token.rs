//! Cached bearer tokens, expiry checks, and unverified JWT expiry extraction.

// crates.io
use jsonwebtoken::{DecodingKey, Validation};
use serde_json::Value;
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Token type reported for bearers that never went through the token endpoint.
pub const BEARER: &str = "Bearer";

/// Bearer token owned by the cache and handed out to callers.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
	/// Token value; callers must avoid logging it.
	pub value: TokenSecret,
	/// Authorization scheme reported by the issuer.
	pub token_type: String,
	/// Expiry instant; `None` for credentials that never expire.
	pub expires_at: Option<OffsetDateTime>,
}
impl CachedToken {
	/// Creates a token that expires at `expires_at`.
	pub fn new(
		value: impl Into<String>,
		token_type: impl Into<String>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			value: TokenSecret::new(value),
			token_type: token_type.into(),
			expires_at: Some(expires_at),
		}
	}

	/// Creates a token without an expiry.
	pub fn non_expiring(value: impl Into<String>, token_type: impl Into<String>) -> Self {
		Self { value: TokenSecret::new(value), token_type: token_type.into(), expires_at: None }
	}

	/// Wraps a pre-issued bearer, reading its expiry when it is a JWT.
	pub fn from_static_bearer(value: &TokenSecret) -> Self {
		Self {
			value: value.clone(),
			token_type: BEARER.into(),
			expires_at: jwt_expiry(value.expose()),
		}
	}

	/// Time left before expiry at `now`; `None` when the token never expires.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Option<Duration> {
		self.expires_at.map(|at| at - now)
	}

	/// Returns `true` when more than `skew` remains before expiry at `now`.
	pub fn is_usable_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		self.remaining_at(now).is_none_or(|remaining| remaining > skew)
	}

	/// Returns `true` once `now` has reached the expiry instant.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|at| at <= now)
	}

	/// Value for an HTTP `Authorization` header.
	pub fn authorization_header(&self) -> String {
		format!("{} {}", self.token_type, self.value.expose())
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("value", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Reads the `exp` claim of a compact JWT without verifying its signature.
///
/// Returns `None` for values that are not JWTs, name an algorithm `jsonwebtoken` does not know
/// (including `none`), or carry no numeric `exp`.
pub fn jwt_expiry(token: &str) -> Option<OffsetDateTime> {
	let mut validation = Validation::default();

	validation.insecure_disable_signature_validation();
	validation.required_spec_claims.clear();
	validation.validate_exp = false;
	validation.validate_aud = false;

	let claims = jsonwebtoken::decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation)
		.ok()?
		.claims;
	let exp = claims.get("exp")?;
	let seconds = exp.as_i64().or_else(|| exp.as_f64().map(|value| value as i64))?;

	OffsetDateTime::from_unix_timestamp(seconds).ok()
}

/// Returns `true` if `token` is a JWT whose `exp` is not in the future.
pub fn is_expired(token: &str) -> bool {
	jwt_expiry(token).is_some_and(|at| at <= OffsetDateTime::now_utc())
}
