use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

pub const FOLLOW_UP_SUFFIX: &str = "_followup";

pub fn validate_identifier_value(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.')
    {
        return Ok(());
    }
    Err(format!(
        "{kind} must use only ASCII letters, digits, '-', '_' or '.'"
    ))
}

macro_rules! define_id_type {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                let trimmed = raw.trim();
                validate_identifier_value($kind, trimmed)?;
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                // Case ids arrive as JSON numbers from the backend.
                let raw = match serde_json::Value::deserialize(deserializer)? {
                    serde_json::Value::String(value) => value,
                    serde_json::Value::Number(value) => value.to_string(),
                    other => {
                        return Err(D::Error::custom(format!(
                            "invalid {} `{}`: expected string or number",
                            $kind, other
                        )))
                    }
                };
                Self::parse(&raw).map_err(|err| {
                    D::Error::custom(format!("invalid {} `{}`: {}", $kind, raw, err))
                })
            }
        }
    };
}

define_id_type!(CaseId, "case id");
define_id_type!(QuestionId, "question id");

impl QuestionId {
    pub fn is_follow_up(&self) -> bool {
        self.0.ends_with(FOLLOW_UP_SUFFIX) && self.0.len() > FOLLOW_UP_SUFFIX.len()
    }

    /// The primary question a `<id>_followup` answer belongs to.
    pub fn follow_up_parent(&self) -> Option<QuestionId> {
        let parent = self.0.strip_suffix(FOLLOW_UP_SUFFIX)?;
        QuestionId::parse(parent).ok()
    }

    pub fn follow_up_id(&self) -> QuestionId {
        QuestionId(format!("{}{}", self.0, FOLLOW_UP_SUFFIX))
    }
}
