use std::{collections::HashSet, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Eq)]
pub struct Scope(HashSet<String>);

impl Scope {
    pub fn from_delimited_parts(parts: &str) -> Self {
        let parts = parts
            .split(' ')
            .filter(|p| !p.is_empty())
            .map(ToString::to_string)
            .collect();
        Self(parts)
    }

    pub fn as_joined(&self) -> String {
        let mut parts = self.as_parts();
        parts.sort();
        parts.join(" ")
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    pub fn as_parts(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    pub fn contains_all(&self, other: &Scope) -> bool {
        self.0.is_superset(&other.0)
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        let mut lhs = self.as_parts();
        let mut rhs = other.as_parts();
        lhs.sort();
        rhs.sort();
        lhs == rhs
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parts = String::deserialize(deserializer)?;
        Ok(Self::from_delimited_parts(&parts))
    }
}

impl Serialize for Scope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let joined = self.as_joined();
        serializer.serialize_str(&joined)
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl FromStr for ClientId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct RedirectUri(pub String);

impl AsRef<str> for RedirectUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(transparent)]
pub struct ClientSecret(pub String);

impl AsRef<str> for ClientSecret {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HashedClientSecret(pub String);

impl From<String> for HashedClientSecret {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for HashedClientSecret {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct AuthCode(pub String);

impl AsRef<str> for AuthCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct HashedAuthCode(pub String);

impl From<String> for HashedAuthCode {
    fn from(from: String) -> Self {
        Self(from)
    }
}

/// An opaque bearer credential as handed to the client. Access and refresh
/// tokens share this shape; the server only ever stores the digest.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct OpaqueToken(pub String);

impl AsRef<str> for OpaqueToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct HashedToken(pub String);

impl From<String> for HashedToken {
    fn from(from: String) -> Self {
        Self(from)
    }
}

#[derive(Debug, Clone, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct ChallengeId(pub String);

impl FromStr for ChallengeId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

#[derive(Debug)]
pub struct BearerToken(pub String);

/// Absolute expiry instant in unix seconds. Always derived from the injected
/// clock plus a configured TTL; the engine never reads the wall clock itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct Expiry(pub u64);

impl Expiry {
    pub fn after(now: u64, ttl_secs: u64) -> Self {
        Self(now.saturating_add(ttl_secs))
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.0 <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_round_trip() {
        let scope = Scope::from_delimited_parts("openid profile email");
        assert!(scope.contains("openid"));
        assert!(scope.contains("email"));
        assert!(!scope.contains("phone"));
        assert_eq!(scope, Scope::from_delimited_parts("email openid profile"));
    }

    #[test]
    fn scope_superset() {
        let granted = Scope::from_delimited_parts("openid profile email");
        let narrow = Scope::from_delimited_parts("openid email");
        assert!(granted.contains_all(&narrow));
        assert!(!narrow.contains_all(&granted));
    }

    #[test]
    fn expiry_boundaries() {
        let e = Expiry::after(100, 600);
        assert!(!e.is_expired(699));
        assert!(e.is_expired(700));
        assert!(e.is_expired(701));
    }
}
