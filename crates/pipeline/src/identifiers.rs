//! Newtype identifiers for provider-facing names and secrets.
//!
//! Model names, API versions, and API keys are all strings on the wire. Giving
//! each its own type prevents passing, for example, an API version where a
//! deployment/model name is expected.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty
            /// or only whitespace.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Name of a hosted model, e.g. `"gpt-4o"` or `"text-embedding-3-small"`.
    ///
    /// For Azure OpenAI this is the deployment name and becomes part of the
    /// request path.
    ModelName
}

impl ModelName {
    /// Chat model used when neither the call nor the configuration names one.
    pub fn default_chat() -> Self {
        Self("gpt-4o".to_string())
    }

    /// Embedding model used when neither the call nor the configuration names one.
    pub fn default_embedding() -> Self {
        Self("text-embedding-3-small".to_string())
    }
}

string_id! {
    /// Provider API version sent as the `api-version` query parameter
    /// (Azure OpenAI only), e.g. `"2024-08-01-preview"`.
    ApiVersion
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// A provider API key.
///
/// `Debug` and `Display` never print the key itself, so credentials can be
/// carried inside request and option types that end up in tracing fields.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiKey(String);

impl ApiKey {
    /// Creates an [`ApiKey`], returning `None` if the value is empty.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        if v.trim().is_empty() {
            None
        } else {
            Some(Self(v))
        }
    }

    /// Returns the raw key for placing into a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_are_rejected() {
        assert!(ModelName::new("").is_none());
        assert!(ModelName::new("   ").is_none());
        assert!(ApiVersion::new("").is_none());
        assert!(ApiKey::new("").is_none());
    }

    #[test]
    fn model_name_displays_raw_value() {
        let name = ModelName::new("gpt-4o").unwrap();
        assert_eq!(name.to_string(), "gpt-4o");
        assert_eq!(name.as_str(), "gpt-4o");
    }

    #[test]
    fn api_key_is_redacted() {
        let key = ApiKey::new("sk-secret").unwrap();
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
        assert_eq!(key.to_string(), "***");
        assert_eq!(key.expose(), "sk-secret");
    }
}
