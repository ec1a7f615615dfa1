//! Secret store contract for the marketplace provisioning system.
//!
//! Large or sensitive blobs (provisioning step lists, accumulated
//! subscription parameters) are kept out of the relational stores and the
//! event log. They live in an opaque name → value store; callers hold only
//! the generated secret name.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{Result, SecretStoreError};
pub use memory::InMemorySecretStore;
pub use store::{
    PARAMETERS_SECRET_PREFIX, PROVISIONING_STEPS_SECRET_PREFIX, SecretStore, generate_secret_name,
};
