//! Normalized role sets used as assertion claims and token-request scopes.

// std
use std::collections::BTreeSet;
// self
use crate::_prelude::*;

/// Errors emitted when validating role identifiers.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RoleValidationError {
	/// Empty role entries are not allowed.
	#[error("Role entries cannot be empty.")]
	Empty,
	/// Roles cannot contain whitespace.
	#[error("Role contains whitespace: {role}.")]
	ContainsWhitespace {
		/// The offending role string.
		role: String,
	},
}

/// Deduplicated, sorted set of role identifiers.
///
/// Ordering is canonical so two identities naming the same roles in a different order hash to
/// the same cache key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct RoleSet(Arc<[String]>);
impl RoleSet {
	/// Creates a normalized role set from any iterator.
	pub fn new<I, S>(roles: I) -> Result<Self, RoleValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut set = BTreeSet::new();

		for role in roles {
			let owned: String = role.into();

			if owned.is_empty() {
				return Err(RoleValidationError::Empty);
			}
			if owned.chars().any(char::is_whitespace) {
				return Err(RoleValidationError::ContainsWhitespace { role: owned });
			}

			set.insert(owned);
		}

		Ok(Self(set.into_iter().collect()))
	}

	/// Number of distinct roles.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` if no roles are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterator over normalized roles.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Formats the roles as the token endpoint's `scope` parameter (`role:<id>` entries).
	pub fn scope_param(&self) -> Option<String> {
		if self.is_empty() {
			return None;
		}

		Some(self.iter().map(|role| format!("role:{role}")).collect::<Vec<_>>().join(" "))
	}
}
impl TryFrom<Vec<String>> for RoleSet {
	type Error = RoleValidationError;

	fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<RoleSet> for Vec<String> {
	fn from(value: RoleSet) -> Self {
		value.0.to_vec()
	}
}
