//! Services layer - Business logic
//!
//! - `credentials`: password hashing and email checks
//! - `session`: session issuing and validation (opaque or signed)
//! - `account`: signup, login, logout and the social graph use cases
//! - `listing`: creating, buying and inspecting listings

pub mod account;
pub mod credentials;
pub mod listing;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use account::{
    AccountError, AccountService, Authenticated, FollowInput, LoginInput, SignupInput,
};
pub use credentials::{hash_password, validate_email, verify_password, CredentialError};
pub use listing::{CreateListingInput, ListingError, ListingService};
pub use session::{OpaqueSessionStore, SessionError, SessionManager, SignedTokenIssuer};
