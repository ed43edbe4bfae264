//! Authentication module for seller sessions.
//!
//! This module provides:
//! - `SessionManager`: restores, establishes and ends the seller session
//! - `KeyValueStore`: durable storage for the token and cached profile,
//!   with file, in-memory and OS keychain implementations
//! - OTP and mobile number input checks for the sign-in flow

pub mod keyring_store;
pub mod otp;
pub mod session;
pub mod store;

pub use keyring_store::KeyringStore;
pub use session::{
    RestoreOutcome, Session, SessionManager, SessionVerifier, AUTH_TOKEN_KEY, SELLER_KEY,
};
pub use store::{FileStore, KeyValueStore, MemoryStore};
