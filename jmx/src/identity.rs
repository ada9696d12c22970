//! MBean object identities.
//!
//! An identity is a domain plus an ordered set of unique `key=value`
//! properties, e.g. `java.lang:type=MemoryPool,name=Metaspace`. Display keeps
//! the insertion order of the properties; equality, hashing and ordering use
//! the sorted property set so `a:x=1,y=2` and `a:y=2,x=1` are the same entity.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{JmxError, JmxResult};

#[derive(Debug, Clone)]
pub struct ObjectIdentity {
    domain: String,
    properties: Vec<(String, String)>,
}

impl ObjectIdentity {
    pub fn new<K, V>(
        domain: impl Into<String>,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> JmxResult<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let domain = domain.into();
        let properties: Vec<(String, String)> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let identity = Self { domain, properties };
        identity.check()?;
        Ok(identity)
    }

    /// Parse the canonical `domain:key=value[,key=value]*` form.
    pub fn parse(name: &str) -> JmxResult<Self> {
        let invalid = |reason: &str| JmxError::InvalidIdentity {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("object name is empty"));
        }
        let (domain, props) = name
            .split_once(':')
            .ok_or_else(|| invalid("missing ':' between domain and properties"))?;
        if props.is_empty() {
            return Err(invalid("no key properties"));
        }

        let mut properties = Vec::new();
        for pair in split_properties(props).map_err(|r| invalid(r))? {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| invalid("property is missing '='"))?;
            properties.push((key.to_string(), value.to_string()));
        }

        let identity = Self {
            domain: domain.to_string(),
            properties,
        };
        identity.check().map_err(|_| invalid("invalid key properties"))?;
        Ok(identity)
    }

    fn check(&self) -> JmxResult<()> {
        let name = self.to_string();
        let invalid = |reason: String| JmxError::InvalidIdentity {
            name: name.clone(),
            reason,
        };
        if self.domain.contains(':') {
            return Err(invalid("domain contains ':'".to_string()));
        }
        if self.properties.is_empty() {
            return Err(invalid("no key properties".to_string()));
        }
        for (i, (key, _)) in self.properties.iter().enumerate() {
            if key.is_empty() {
                return Err(invalid("empty property key".to_string()));
            }
            if self.properties[..i].iter().any(|(k, _)| k == key) {
                return Err(invalid(format!("duplicate property key '{}'", key)));
            }
        }
        Ok(())
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `type` key property, by convention the MBean's category.
    pub fn type_property(&self) -> Option<&str> {
        self.property("type")
    }

    fn sorted_properties(&self) -> Vec<(&str, &str)> {
        let mut props: Vec<(&str, &str)> = self
            .properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        props.sort_unstable();
        props
    }
}

/// Split on commas that are not inside a quoted value.
fn split_properties(props: &str) -> Result<Vec<&str>, &'static str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in props.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&props[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err("unterminated quoted value");
    }
    parts.push(&props[start..]);

    if parts.iter().any(|p| p.is_empty()) {
        return Err("empty key property");
    }
    Ok(parts)
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        for (i, (k, v)) in self.properties.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

impl FromStr for ObjectIdentity {
    type Err = JmxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for ObjectIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain && self.sorted_properties() == other.sorted_properties()
    }
}

impl Eq for ObjectIdentity {}

impl Hash for ObjectIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.domain.hash(state);
        self.sorted_properties().hash(state);
    }
}

impl PartialOrd for ObjectIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.domain
            .cmp(&other.domain)
            .then_with(|| self.sorted_properties().cmp(&other.sorted_properties()))
    }
}

impl Serialize for ObjectIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
