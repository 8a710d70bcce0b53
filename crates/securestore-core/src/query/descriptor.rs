//! Query descriptors: how a class of secrets is located

use std::fmt;

use super::attributes::{AttributeKey, AttributeSet, ItemClass};

/// Protocol of an endpoint-scoped secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternetProtocol {
    Http,
    Https,
    Ftp,
    Ftps,
    Smtp,
    Imap,
}

impl InternetProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            InternetProtocol::Http => "http",
            InternetProtocol::Https => "https",
            InternetProtocol::Ftp => "ftp",
            InternetProtocol::Ftps => "ftps",
            InternetProtocol::Smtp => "smtp",
            InternetProtocol::Imap => "imap",
        }
    }
}

impl fmt::Display for InternetProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication scheme of an endpoint-scoped secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthenticationType {
    HttpBasic,
    HttpDigest,
    HtmlForm,
    Ntlm,
    Default,
}

impl AuthenticationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationType::HttpBasic => "http_basic",
            AuthenticationType::HttpDigest => "http_digest",
            AuthenticationType::HtmlForm => "html_form",
            AuthenticationType::Ntlm => "ntlm",
            AuthenticationType::Default => "default",
        }
    }
}

impl fmt::Display for AuthenticationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a network endpoint whose credentials are stored
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointDescriptor {
    pub server: String,
    pub port: u16,
    pub path: String,
    pub security_domain: String,
    pub protocol: InternetProtocol,
    pub auth_type: AuthenticationType,
}

impl EndpointDescriptor {
    /// Create an endpoint descriptor with an empty path and security domain
    pub fn new(
        server: impl Into<String>,
        port: u16,
        protocol: InternetProtocol,
        auth_type: AuthenticationType,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            path: String::new(),
            security_domain: String::new(),
            protocol,
            auth_type,
        }
    }

    /// Set the path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the security domain (realm)
    pub fn with_security_domain(mut self, domain: impl Into<String>) -> Self {
        self.security_domain = domain.into();
        self
    }
}

/// Describes how to locate a class of secrets
///
/// A descriptor is pure data. It is bound to a
/// [`SecureStore`](crate::store::SecureStore) at construction and scopes
/// every operation of that store.
///
/// # Example
///
/// ```
/// use securestore_core::query::{
///     AuthenticationType, EndpointDescriptor, InternetProtocol, QueryDescriptor,
/// };
///
/// let generic = QueryDescriptor::generic("someService");
///
/// let endpoint = QueryDescriptor::Endpoint(
///     EndpointDescriptor::new("someServer", 8080, InternetProtocol::Https, AuthenticationType::HttpBasic)
///         .with_path("somePath")
///         .with_security_domain("someDomain"),
/// );
///
/// assert_ne!(
///     generic.attributes_for_query(None).scope_key(),
///     endpoint.attributes_for_query(None).scope_key(),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryDescriptor {
    /// Application secret identified by an opaque service name
    Generic {
        service: String,
        /// Optional sharing group narrowing the scope further
        access_group: Option<String>,
    },
    /// Secret scoped to a network endpoint
    Endpoint(EndpointDescriptor),
}

impl QueryDescriptor {
    /// Generic descriptor for a service name
    pub fn generic(service: impl Into<String>) -> Self {
        QueryDescriptor::Generic {
            service: service.into(),
            access_group: None,
        }
    }

    /// Generic descriptor restricted to an access group
    pub fn generic_with_access_group(
        service: impl Into<String>,
        access_group: impl Into<String>,
    ) -> Self {
        QueryDescriptor::Generic {
            service: service.into(),
            access_group: Some(access_group.into()),
        }
    }

    /// Endpoint descriptor from its individual fields
    pub fn endpoint(
        server: impl Into<String>,
        port: u16,
        path: impl Into<String>,
        security_domain: impl Into<String>,
        protocol: InternetProtocol,
        auth_type: AuthenticationType,
    ) -> Self {
        QueryDescriptor::Endpoint(
            EndpointDescriptor::new(server, port, protocol, auth_type)
                .with_path(path)
                .with_security_domain(security_domain),
        )
    }

    pub fn item_class(&self) -> ItemClass {
        match self {
            QueryDescriptor::Generic { .. } => ItemClass::Generic,
            QueryDescriptor::Endpoint(_) => ItemClass::Endpoint,
        }
    }

    /// Scope attributes, optionally narrowed to one account
    pub fn attributes_for_query(&self, account: Option<&str>) -> AttributeSet {
        let set = match self {
            QueryDescriptor::Generic { service, access_group } => {
                let set = AttributeSet::new(ItemClass::Generic)
                    .with(AttributeKey::Service, service.as_str());
                match access_group {
                    Some(group) => set.with(AttributeKey::AccessGroup, group.as_str()),
                    None => set,
                }
            }
            QueryDescriptor::Endpoint(endpoint) => AttributeSet::new(ItemClass::Endpoint)
                .with(AttributeKey::Server, endpoint.server.as_str())
                .with(AttributeKey::Port, endpoint.port.to_string())
                .with(AttributeKey::Path, endpoint.path.as_str())
                .with(AttributeKey::SecurityDomain, endpoint.security_domain.as_str())
                .with(AttributeKey::Protocol, endpoint.protocol.as_str())
                .with(AttributeKey::AuthenticationType, endpoint.auth_type.as_str()),
        };

        match account {
            Some(account) => set.with_account(account),
            None => set,
        }
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryDescriptor::Generic { service, access_group: None } => {
                write!(f, "generic:{}", service)
            }
            QueryDescriptor::Generic { service, access_group: Some(group) } => {
                write!(f, "generic:{}@{}", service, group)
            }
            QueryDescriptor::Endpoint(e) => {
                write!(f, "endpoint:{}://{}:{}/{}", e.protocol, e.server, e.port, e.path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some_endpoint() -> QueryDescriptor {
        QueryDescriptor::endpoint(
            "someServer",
            8080,
            "somePath",
            "someDomain",
            InternetProtocol::Https,
            AuthenticationType::HttpBasic,
        )
    }

    #[test]
    fn test_generic_attributes() {
        let attrs = QueryDescriptor::generic("someService").attributes_for_query(None);

        assert_eq!(attrs.item_class(), ItemClass::Generic);
        assert_eq!(attrs.get(AttributeKey::Service), Some("someService"));
        assert_eq!(attrs.get(AttributeKey::AccessGroup), None);
        assert_eq!(attrs.account(), None);
    }

    #[test]
    fn test_generic_access_group_narrows_scope() {
        let plain = QueryDescriptor::generic("svc").attributes_for_query(None);
        let grouped = QueryDescriptor::generic_with_access_group("svc", "team")
            .attributes_for_query(None);

        assert_eq!(grouped.get(AttributeKey::AccessGroup), Some("team"));
        assert_ne!(plain.scope_key(), grouped.scope_key());
    }

    #[test]
    fn test_endpoint_attributes() {
        let attrs = some_endpoint().attributes_for_query(Some("user"));

        assert_eq!(attrs.item_class(), ItemClass::Endpoint);
        assert_eq!(attrs.get(AttributeKey::Server), Some("someServer"));
        assert_eq!(attrs.get(AttributeKey::Port), Some("8080"));
        assert_eq!(attrs.get(AttributeKey::Path), Some("somePath"));
        assert_eq!(attrs.get(AttributeKey::SecurityDomain), Some("someDomain"));
        assert_eq!(attrs.get(AttributeKey::Protocol), Some("https"));
        assert_eq!(attrs.get(AttributeKey::AuthenticationType), Some("http_basic"));
        assert_eq!(attrs.account(), Some("user"));
    }

    #[test]
    fn test_attributes_are_deterministic() {
        let d = some_endpoint();
        assert_eq!(d.attributes_for_query(Some("a")), d.attributes_for_query(Some("a")));
        assert_eq!(
            d.attributes_for_query(Some("a")).scope_key(),
            d.attributes_for_query(None).scope_key()
        );
    }

    #[test]
    fn test_endpoint_fields_partition_scope() {
        let base = some_endpoint();
        let other_port = QueryDescriptor::endpoint(
            "someServer",
            8081,
            "somePath",
            "someDomain",
            InternetProtocol::Https,
            AuthenticationType::HttpBasic,
        );
        let other_protocol = QueryDescriptor::endpoint(
            "someServer",
            8080,
            "somePath",
            "someDomain",
            InternetProtocol::Http,
            AuthenticationType::HttpBasic,
        );

        let key = base.attributes_for_query(None).scope_key();
        assert_ne!(key, other_port.attributes_for_query(None).scope_key());
        assert_ne!(key, other_protocol.attributes_for_query(None).scope_key());
    }

    #[test]
    fn test_empty_service_is_accepted() {
        let attrs = QueryDescriptor::generic("").attributes_for_query(None);
        assert_eq!(attrs.get(AttributeKey::Service), Some(""));
    }

    #[test]
    fn test_display() {
        assert_eq!(QueryDescriptor::generic("svc").to_string(), "generic:svc");
        assert_eq!(
            some_endpoint().to_string(),
            "endpoint:https://someServer:8080/somePath"
        );
    }
}
