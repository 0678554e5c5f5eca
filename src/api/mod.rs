//! Persistence: the schema backend client and the document mapping.

mod client;
mod error;
pub mod mapping;
pub mod wire;

pub use client::{InMemorySchemaBackend, SchemaBackend};
#[cfg(not(target_arch = "wasm32"))]
pub use client::SchemaClient;
pub use error::ApiError;
pub use mapping::{from_document, to_draft, LoadedSchema};
