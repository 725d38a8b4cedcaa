//! Validated identifiers carried by service-account credentials.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

const IDENTIFIER_MAX_LEN: usize = 256;

macro_rules! service_account_id {
	($(#[$meta:meta])* $name:ident => $kind:literal) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, Hash)]
		pub struct $name(String);
		impl $name {
			/// Validates `value` and wraps it.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				check($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

/// Reason an identifier was refused.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// Nothing was supplied.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier kind.
		kind: &'static str,
	},
	/// Whitespace or control characters would not survive a JWT header round trip.
	#[error("{kind} identifier contains whitespace or control characters.")]
	InvalidCharacter {
		/// Identifier kind.
		kind: &'static str,
	},
	/// Longer than the vault accepts.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Identifier kind.
		kind: &'static str,
		/// Maximum byte length.
		max: usize,
	},
}

service_account_id! {
	/// Service-account client identifier; doubles as assertion issuer and subject.
	ClientId => "Client"
}
service_account_id! {
	/// Identifier of the signing key registered for a service account.
	KeyId => "Key"
}

fn check(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
	if value.is_empty() {
		Err(IdentifierError::Empty { kind })
	} else if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
		Err(IdentifierError::InvalidCharacter { kind })
	} else if value.len() > IDENTIFIER_MAX_LEN {
		Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN })
	} else {
		Ok(())
	}
}
