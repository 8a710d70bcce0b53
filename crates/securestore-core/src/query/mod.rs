//! Query descriptors
//!
//! A descriptor names a class of secrets: either a generic application
//! secret keyed by a service name, or a credential scoped to a network
//! endpoint. Descriptors translate into an [`AttributeSet`] that backends
//! use to partition their keyspace.

mod attributes;
mod descriptor;

pub use attributes::{AttributeKey, AttributeSet, ItemClass};
pub use descriptor::{AuthenticationType, EndpointDescriptor, InternetProtocol, QueryDescriptor};
