//! Redacting wrapper for bearer tokens, API keys, and private keys.

// self
use crate::_prelude::*;

/// Secret string that keeps sensitive material out of logs.
///
/// Backed by `Arc<str>`: a cached token is cloned to every single-flight waiter, so clones only
/// bump a reference count.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TokenSecret(Arc<str>);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(Arc::from(value.into()))
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` if the secret holds no characters.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
impl From<TokenSecret> for String {
	fn from(secret: TokenSecret) -> Self {
		secret.0.as_ref().to_owned()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret(<redacted; {} bytes>)", self.0.len())
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatters_redact_but_serde_does_not() {
		let secret = TokenSecret::new("sky-key");

		assert_eq!(format!("{secret:?}"), "TokenSecret(<redacted; 7 bytes>)");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(
			serde_json::to_string(&secret).expect("Secret should serialize."),
			"\"sky-key\""
		);

		let parsed: TokenSecret =
			serde_json::from_str("\"sky-key\"").expect("Secret should deserialize.");

		assert_eq!(parsed, secret);
	}
}
