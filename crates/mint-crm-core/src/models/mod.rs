// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain records and the choice enums stored in their `TEXT` columns.
//!
//! Every enum is generated by `crm_enum!`, which gives it a stable wire/storage
//! value (`as_str`), a human label (`label`), `FromStr`, and `TryFrom<String>` so
//! that `#[sqlx(try_from = "String")]` can decode it straight from a row.

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Deserializer for nullable patch fields.
///
/// With `#[serde(default)]`, a missing key stays `None`, an explicit `null`
/// becomes `Some(None)` and a value becomes `Some(Some(v))`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Returned when a stored or submitted value is not a member of a choice enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownVariant {
    /// Enum name.
    pub kind: &'static str,
    /// Offending value.
    pub value: String,
}

macro_rules! crm_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => ($value:literal, $label:literal)
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Value stored in the database and used on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            /// Human readable label.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    _ => Err($crate::models::UnknownVariant {
                        kind: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::UnknownVariant;

            fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub mod case;
pub mod contact;
pub mod document;
pub mod email;
pub mod meeting;
pub mod notification;
pub mod report;
pub mod sms;
pub mod task;
pub mod user;

pub use case::*;
pub use contact::*;
pub use document::*;
pub use email::*;
pub use meeting::*;
pub use notification::*;
pub use report::*;
pub use sms::*;
pub use task::*;
pub use user::*;

crm_enum! {
    /// Urgency shared by cases, meetings and tasks.
    pub enum Priority {
        Low => ("low", "Low"),
        #[default]
        Medium => ("medium", "Medium"),
        High => ("high", "High"),
        Urgent => ("urgent", "Urgent"),
    }
}

impl Priority {
    /// Numeric rank used for sorting, 1 (low) to 4 (urgent).
    pub fn score(&self) -> i32 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_round_trips_through_str() {
        for p in Priority::ALL {
            assert_eq!(p.as_str().parse::<Priority>().unwrap(), *p);
        }
    }

    #[test]
    fn test_unknown_value_is_rejected() {
        let err = "critical".parse::<Priority>().unwrap_err();
        assert_eq!(err.kind, "Priority");
        assert_eq!(err.to_string(), "Unknown Priority value: critical");
    }

    #[test]
    fn test_priority_score_ordering() {
        let scores: Vec<i32> = Priority::ALL.iter().map(|p| p.score()).collect();
        assert_eq!(scores, vec![1, 2, 3, 4]);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        due: Option<Option<i64>>,
    }

    #[test]
    fn test_nullable_separates_missing_from_null() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.due, None);
        let cleared: Patch = serde_json::from_str(r#"{"due": null}"#).unwrap();
        assert_eq!(cleared.due, Some(None));
        let set: Patch = serde_json::from_str(r#"{"due": 7}"#).unwrap();
        assert_eq!(set.due, Some(Some(7)));
    }

    #[test]
    fn test_serde_uses_storage_value() {
        let json = serde_json::to_string(&Priority::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
        let back: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(back, Priority::Low);
    }
}
