//! Account and asset identifiers

use crate::error::{TypeError, TypeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account identifier of the form `name@domain`
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Build from name and domain parts
    pub fn new(name: &str, domain: &str) -> Self {
        Self(format!("{}@{}", name, domain))
    }

    /// Full identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `name` part
    pub fn name(&self) -> &str {
        self.0.split('@').next().unwrap_or("")
    }

    /// The `domain` part
    pub fn domain(&self) -> &str {
        self.0.split('@').nth(1).unwrap_or("")
    }
}

impl FromStr for AccountId {
    type Err = TypeError;

    fn from_str(s: &str) -> TypeResult<Self> {
        let mut parts = s.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(domain), None) if !name.is_empty() && !domain.is_empty() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(TypeError::InvalidAccountId(s.to_string())),
        }
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset identifier of the form `asset#domain`
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Build from name and domain parts
    pub fn new(name: &str, domain: &str) -> Self {
        Self(format!("{}#{}", name, domain))
    }

    /// Full identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AssetId {
    type Err = TypeError;

    fn from_str(s: &str) -> TypeResult<Self> {
        let mut parts = s.split('#');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(domain), None) if !name.is_empty() && !domain.is_empty() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(TypeError::InvalidAssetId(s.to_string())),
        }
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
