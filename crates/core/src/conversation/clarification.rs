//! Clarification outcomes for conversational deltas.
//!
//! A delta that refers to an entry the merge cannot pin down to exactly one
//! prior value is never guessed at. The caller receives the candidates and a
//! question to put back to the user instead.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::specification::{LogoPlacement, LogoPosition};

/// Why a reference could not be resolved
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationReason {
    /// More than one prior entry matches
    AmbiguousReference,
    /// No prior entry matches
    NoMatch,
}

/// One prior entry the user may have meant
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationOption {
    /// Stable identifier (position for logos, normalized name for lists)
    pub id: String,
    /// Display label
    pub label: String,
    /// Value to send back in a follow-up delta
    pub value: serde_json::Value,
}

/// Distinguished outcome of applying a delta. Nothing was merged or saved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationNeeded {
    /// Composite field the reference was made against (`logos`, `fabrics`, `accessories`)
    pub field: String,
    pub reason: ClarificationReason,
    /// The reference as the delta stated it
    pub reference: String,
    pub candidates: Vec<ClarificationOption>,
    /// Question to put back to the user
    pub prompt: String,
}

impl ClarificationNeeded {
    pub fn ambiguous(
        field: &str,
        reference: impl Into<String>,
        candidates: Vec<ClarificationOption>,
    ) -> Self {
        let reference = reference.into();
        let labels =
            candidates.iter().map(|candidate| candidate.label.as_str()).collect::<Vec<_>>();
        let prompt = format!(
            "`{reference}` matches {} {field} entries ({}). Which one did you mean?",
            candidates.len(),
            labels.join(", ")
        );
        Self {
            field: field.to_string(),
            reason: ClarificationReason::AmbiguousReference,
            reference,
            candidates,
            prompt,
        }
    }

    pub fn no_match(
        field: &str,
        reference: impl Into<String>,
        candidates: Vec<ClarificationOption>,
    ) -> Self {
        let reference = reference.into();
        let prompt = if candidates.is_empty() {
            format!("There is no {field} entry matching `{reference}` on this quote.")
        } else {
            let labels =
                candidates.iter().map(|candidate| candidate.label.as_str()).collect::<Vec<_>>();
            format!(
                "There is no {field} entry matching `{reference}`. Current {field}: {}. Which one should change?",
                labels.join(", ")
            )
        };
        Self {
            field: field.to_string(),
            reason: ClarificationReason::NoMatch,
            reference,
            candidates,
            prompt,
        }
    }
}

impl fmt::Display for ClarificationNeeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prompt)
    }
}

impl ClarificationOption {
    pub fn logo(position: LogoPosition, placement: &LogoPlacement) -> Self {
        Self {
            id: position.to_string(),
            label: format!("{position}: {placement}"),
            value: serde_json::json!({ "position": position, "placement": placement }),
        }
    }

    pub fn named(id: String, name: &str) -> Self {
        Self { id, label: name.to_string(), value: serde_json::Value::String(name.to_string()) }
    }
}
