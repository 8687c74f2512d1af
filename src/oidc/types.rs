use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct Nonce(pub String);

impl AsRef<str> for Nonce {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    None,
    Login,
    Consent,
    SelectAccount,
}

impl Prompt {
    pub fn requires_interaction(&self) -> bool {
        matches!(self, Self::Login | Self::Consent)
    }
}

/// Query-string numbers arrive as strings; accept either form.
pub fn deserialize_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Num(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom("expected an integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct MaxAge {
        #[serde(default, deserialize_with = "deserialize_opt_u64")]
        max_age: Option<u64>,
    }

    #[test]
    fn max_age_parses_from_query_text() {
        let q: MaxAge = serde_urlencoded::from_str("max_age=300").unwrap();
        assert_eq!(q.max_age, Some(300));

        let q: MaxAge = serde_urlencoded::from_str("").unwrap();
        assert_eq!(q.max_age, None);

        assert!(serde_urlencoded::from_str::<MaxAge>("max_age=abc").is_err());
    }

    #[test]
    fn prompt_interaction_classes() {
        assert!(Prompt::Login.requires_interaction());
        assert!(Prompt::Consent.requires_interaction());
        assert!(!Prompt::None.requires_interaction());
        assert!(!Prompt::SelectAccount.requires_interaction());
    }
}
