//! Attribute sets produced by query descriptors

use std::collections::BTreeMap;
use std::fmt;

/// Family of secrets a scope belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemClass {
    /// Secrets identified by an opaque service name
    Generic,
    /// Secrets scoped to a network endpoint
    Endpoint,
}

impl ItemClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemClass::Generic => "genp",
            ItemClass::Endpoint => "inet",
        }
    }
}

impl fmt::Display for ItemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute names understood by backends
///
/// The declaration order is the canonical order used by [`AttributeSet::scope_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeKey {
    Service,
    AccessGroup,
    Server,
    Port,
    Path,
    SecurityDomain,
    Protocol,
    AuthenticationType,
    Account,
}

impl AttributeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKey::Service => "service",
            AttributeKey::AccessGroup => "access_group",
            AttributeKey::Server => "server",
            AttributeKey::Port => "port",
            AttributeKey::Path => "path",
            AttributeKey::SecurityDomain => "security_domain",
            AttributeKey::Protocol => "protocol",
            AttributeKey::AuthenticationType => "auth_type",
            AttributeKey::Account => "account",
        }
    }
}

/// The attributes a backend uses to scope a query
///
/// An attribute set always carries an [`ItemClass`] and a set of
/// string-valued attributes. It may additionally be narrowed to a single
/// account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeSet {
    class: ItemClass,
    attributes: BTreeMap<AttributeKey, String>,
}

impl AttributeSet {
    /// Create an empty attribute set for the given class
    pub fn new(class: ItemClass) -> Self {
        Self {
            class,
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute, replacing any previous value for the same key
    pub fn with(mut self, key: AttributeKey, value: impl Into<String>) -> Self {
        self.attributes.insert(key, value.into());
        self
    }

    pub fn item_class(&self) -> ItemClass {
        self.class
    }

    pub fn get(&self, key: AttributeKey) -> Option<&str> {
        self.attributes.get(&key).map(String::as_str)
    }

    /// The account this set is narrowed to, if any
    pub fn account(&self) -> Option<&str> {
        self.get(AttributeKey::Account)
    }

    /// Narrow the set to one account
    pub fn with_account(self, account: impl Into<String>) -> Self {
        self.with(AttributeKey::Account, account)
    }

    /// Drop the account attribute, leaving only the scope
    pub fn without_account(&self) -> Self {
        let mut scope = self.clone();
        scope.attributes.remove(&AttributeKey::Account);
        scope
    }

    /// Iterate over attributes in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (AttributeKey, &str)> {
        self.attributes.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Canonical string identifying the scope
    ///
    /// The account attribute is never part of the key. Distinct scopes
    /// always produce distinct keys: separators inside values are escaped.
    pub fn scope_key(&self) -> String {
        let mut key = String::from(self.class.as_str());
        for (name, value) in self.iter() {
            if name == AttributeKey::Account {
                continue;
            }
            key.push('|');
            key.push_str(name.as_str());
            key.push('=');
            push_escaped(&mut key, value);
        }
        key
    }
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        if matches!(c, '\\' | '|' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
}
