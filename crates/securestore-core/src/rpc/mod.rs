//! RPC module for remote secret managers
//!
//! Lets a secret manager running in another process (a vault agent, an IDE
//! host, a password manager helper) serve as a storage backend.
//!
//! The RPC protocol uses:
//! - Unix sockets
//! - JSON-RPC 2.0 with Content-Length headers (LSP-style)
//! - Authentication tokens for security

mod client;
mod rpc_backend;

pub use client::{read_message, write_message, RpcClient, RpcError, RpcResult, DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE};
pub use rpc_backend::{codes, RpcBackend, ScopeParams};
