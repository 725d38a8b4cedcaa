//! Credential inputs, the validated [`Identity`], and its stable cache key.
//!
//! Applications hand the SDK a [`CredentialInput`] carrying up to four optional sources. The
//! conversion into an [`Identity`] is where the "exactly one source" rule is enforced; past
//! that point the source is a [`CredentialSource`] variant and the rule holds by construction.

// std
use std::path::PathBuf;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{RoleSet, TokenSecret},
	error::CredentialError,
};

/// The single place an [`Identity`] obtains its credentials from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialSource {
	/// Path to a service-account credential file.
	File(PathBuf),
	/// Service-account credential document passed inline.
	Inline(TokenSecret),
	/// Pre-issued bearer token used as-is.
	StaticToken(TokenSecret),
	/// Vault API key used as-is.
	ApiKey(TokenSecret),
}
impl CredentialSource {
	/// Returns the field label used in error messages.
	pub const fn label(&self) -> &'static str {
		match self {
			Self::File(_) => "filePath",
			Self::Inline(_) => "inlineCredentialJSON",
			Self::StaticToken(_) => "staticToken",
			Self::ApiKey(_) => "apiKey",
		}
	}

	/// Returns `true` for sources that resolve to signing key material.
	pub const fn can_sign(&self) -> bool {
		matches!(self, Self::File(_) | Self::Inline(_))
	}
}

/// Raw, possibly ambiguous credential input as received from the calling application.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialInput {
	/// Path to a credential file.
	pub file_path: Option<PathBuf>,
	/// Inline credential JSON document.
	#[serde(rename = "inlineCredentialJSON")]
	pub inline_credential_json: Option<String>,
	/// Pre-issued bearer token.
	pub static_token: Option<String>,
	/// Vault API key.
	pub api_key: Option<String>,
	/// Roles requested for the issued token.
	#[serde(default)]
	pub roles: Vec<String>,
	/// Context claim forwarded to the vault.
	pub context: Option<String>,
}
impl CredentialInput {
	/// Sets the credential file path.
	pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.file_path = Some(path.into());

		self
	}

	/// Sets the inline credential document.
	pub fn with_inline_json(mut self, json: impl Into<String>) -> Self {
		self.inline_credential_json = Some(json.into());

		self
	}

	/// Sets the static bearer token.
	pub fn with_static_token(mut self, token: impl Into<String>) -> Self {
		self.static_token = Some(token.into());

		self
	}

	/// Sets the API key.
	pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(key.into());

		self
	}

	/// Appends a role.
	pub fn with_role(mut self, role: impl Into<String>) -> Self {
		self.roles.push(role.into());

		self
	}

	/// Sets the context claim.
	pub fn with_context(mut self, context: impl Into<String>) -> Self {
		self.context = Some(context.into());

		self
	}
}

/// Validated caller identity: one credential source plus optional claim material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
	source: CredentialSource,
	roles: RoleSet,
	context: Option<String>,
}
impl Identity {
	/// Creates an identity for the provided source with no roles or context.
	pub fn new(source: CredentialSource) -> Self {
		Self { source, roles: RoleSet::default(), context: None }
	}

	/// Replaces the requested roles.
	pub fn with_roles(mut self, roles: RoleSet) -> Self {
		self.roles = roles;

		self
	}

	/// Sets the context claim.
	pub fn with_context(mut self, context: impl Into<String>) -> Self {
		self.context = Some(context.into());

		self
	}

	/// Credential source backing this identity.
	pub fn source(&self) -> &CredentialSource {
		&self.source
	}

	/// Requested roles.
	pub fn roles(&self) -> &RoleSet {
		&self.roles
	}

	/// Optional context claim.
	pub fn context(&self) -> Option<&str> {
		self.context.as_deref()
	}

	/// Stable cache key derived from every field that influences the issued token.
	pub fn key(&self) -> IdentityKey {
		let mut hasher = Sha256::new();
		let mut segment = |bytes: &[u8]| {
			hasher.update((bytes.len() as u64).to_be_bytes());
			hasher.update(bytes);
		};

		segment(self.source.label().as_bytes());

		match &self.source {
			CredentialSource::File(path) => segment(path.as_os_str().as_encoded_bytes()),
			CredentialSource::Inline(secret)
			| CredentialSource::StaticToken(secret)
			| CredentialSource::ApiKey(secret) => segment(secret.expose().as_bytes()),
		}
		for role in self.roles.iter() {
			segment(role.as_bytes());
		}

		segment(self.context.as_deref().unwrap_or_default().as_bytes());

		IdentityKey(URL_SAFE_NO_PAD.encode(hasher.finalize()))
	}
}
impl TryFrom<CredentialInput> for Identity {
	type Error = CredentialError;

	fn try_from(input: CredentialInput) -> Result<Self, Self::Error> {
		let CredentialInput {
			file_path,
			inline_credential_json,
			static_token,
			api_key,
			roles,
			context,
		} = input;
		let mut sources = Vec::with_capacity(1);

		if let Some(path) = file_path.filter(|path| !path.as_os_str().is_empty()) {
			sources.push(CredentialSource::File(path));
		}
		if let Some(json) = populated(inline_credential_json) {
			sources.push(CredentialSource::Inline(TokenSecret::new(json)));
		}
		if let Some(token) = populated(static_token) {
			sources.push(CredentialSource::StaticToken(TokenSecret::new(token)));
		}
		if let Some(key) = populated(api_key) {
			sources.push(CredentialSource::ApiKey(TokenSecret::new(key)));
		}
		if sources.len() > 1 {
			return Err(CredentialError::MultipleSources {
				found: sources.iter().map(CredentialSource::label).collect(),
			});
		}

		let source = sources.pop().ok_or(CredentialError::MissingSource)?;
		let roles = RoleSet::new(roles).map_err(|e| CredentialError::malformed("roles", e))?;
		let mut identity = Self::new(source).with_roles(roles);

		identity.context = populated(context);

		Ok(identity)
	}
}

/// Stable, non-reversible fingerprint of an [`Identity`] used to key the token cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdentityKey(String);
impl IdentityKey {
	/// Returns the encoded fingerprint.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for IdentityKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn populated(value: Option<String>) -> Option<String> {
	value.filter(|value| !value.trim().is_empty())
}
