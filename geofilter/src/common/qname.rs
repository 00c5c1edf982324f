use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// A namespace-qualified name such as `app:population`.
///
/// Two names are equal when namespace and local name match; the prefix is
/// only a spelling detail of the document the name came from.
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QualifiedName {
    namespace: Option<String>,
    local_name: String,
    prefix: Option<String>,
}

impl QualifiedName {
    pub fn new(namespace: Option<&str>, local_name: &str, prefix: Option<&str>) -> Self {
        QualifiedName {
            namespace: namespace.map(str::to_string),
            local_name: local_name.to_string(),
            prefix: prefix.map(str::to_string),
        }
    }

    /// A name without namespace.
    pub fn local(local_name: &str) -> Self {
        QualifiedName::new(None, local_name, None)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

impl PartialEq for QualifiedName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.local_name == other.local_name
    }
}

impl Hash for QualifiedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local_name.hash(state);
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.prefix, &self.namespace) {
            (Some(prefix), _) => write!(f, "{}:{}", prefix, self.local_name),
            (None, Some(ns)) => write!(f, "{{{}}}{}", ns, self.local_name),
            (None, None) => write!(f, "{}", self.local_name),
        }
    }
}
