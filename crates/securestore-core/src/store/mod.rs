//! The secure store façade
//!
//! Binds a [`QueryDescriptor`](crate::query::QueryDescriptor) to a
//! [`BackendAdapter`](crate::backends::BackendAdapter).

mod secure_store;

pub use secure_store::SecureStore;
