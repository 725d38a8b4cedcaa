//! Credential sources, identities, assertion signing, and bearer-token models.

pub mod credential;
pub mod id;
pub mod identity;
pub mod role;
pub mod secret;
pub mod signer;
pub mod token;

pub use credential::*;
pub use id::*;
pub use identity::*;
pub use role::*;
pub use secret::*;
pub use signer::*;
pub use token::*;
