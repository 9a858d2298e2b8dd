//! The action vocabulary of the automation pipeline.
//!
//! The planner produces free-text steps ("busca el icono de 'Inicio'",
//! "haz clic en…"); they are parsed exactly once, at this boundary, into a
//! tagged [`Action`] that the runner consumes via exhaustive matching.

use crate::knowledge::ElementKind;
use serde::{Deserialize, Serialize};

/// One step as emitted by the instruction-to-steps planner and as stored
/// inside task-flow records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub step: u32,
    pub action: String,
}

/// A single UI action, decoded from planner text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Resolve a UI element from its description; the winning reference
    /// image becomes the target of subsequent clicks.
    Locate {
        element_type: ElementKind,
        description: String,
    },
    Click,
    DoubleClick,
    TypeText(String),
    PressKey(String),
    /// Pause for the given number of seconds.
    Wait(u64),
    /// Planner emitted something this pipeline cannot perform; carried
    /// through so the runner can log and skip it.
    Unrecognized(String),
}

/// Seconds used for "espera a que…" style waits that name no duration.
const DEFAULT_WAIT_SECS: u64 = 2;

impl Action {
    /// Decode one planner step. Parsing is lenient: anything that does not
    /// match a known verb becomes [`Action::Unrecognized`] rather than an
    /// error, because the planner is an external model and its output is
    /// not under our control.
    pub fn parse(text: &str) -> Action {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();

        if lower.starts_with("busca") {
            let description = first_quoted(trimmed)
                .unwrap_or_else(|| after_element_noun(trimmed).to_string());
            return Action::Locate {
                element_type: element_kind_of(&lower),
                description,
            };
        }
        if lower.starts_with("haz doble clic") || lower.starts_with("doble clic") {
            return Action::DoubleClick;
        }
        if lower.starts_with("haz clic") || lower.starts_with("clic") {
            return Action::Click;
        }
        if lower.starts_with("escribe") {
            let text = first_quoted(trimmed)
                .unwrap_or_else(|| trimmed["escribe".len()..].trim().to_string());
            return Action::TypeText(text);
        }
        if lower.starts_with("presiona") || lower.starts_with("pulsa") {
            if let Some(key) = first_quoted(trimmed) {
                return Action::PressKey(key);
            }
            return Action::Unrecognized(trimmed.to_string());
        }
        if lower.starts_with("espera") {
            let seconds = first_number(&lower).unwrap_or(DEFAULT_WAIT_SECS);
            return Action::Wait(seconds);
        }

        Action::Unrecognized(trimmed.to_string())
    }
}

/// Which element vocabulary word the step mentions.
fn element_kind_of(lower: &str) -> ElementKind {
    if lower.contains("icono") {
        ElementKind::Icon
    } else if lower.contains("botón") || lower.contains("boton") {
        ElementKind::Button
    } else if lower.contains("pestaña") || lower.contains("pestana") {
        ElementKind::Tab
    } else if lower.contains("campo") {
        ElementKind::InputField
    } else if lower.contains("texto") {
        ElementKind::Text
    } else {
        ElementKind::Unknown
    }
}

/// Text between the first pair of single or double quotes, if any.
fn first_quoted(text: &str) -> Option<String> {
    for quote in ['\'', '"'] {
        let mut parts = text.splitn(3, quote);
        parts.next()?;
        if let (Some(inner), Some(_)) = (parts.next(), parts.next()) {
            if !inner.trim().is_empty() {
                return Some(inner.trim().to_string());
            }
        }
    }
    None
}

/// First run of digits, parsed.
fn first_number(text: &str) -> Option<u64> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Fallback description for unquoted locate steps: everything after the
/// element noun and its articles ("busca el icono de X" -> "X").
fn after_element_noun(text: &str) -> &str {
    let lower = text.to_lowercase();
    for noun in [
        "icono del",
        "icono de",
        "botón del",
        "botón de",
        "boton del",
        "boton de",
        "pestaña de",
        "pestana de",
        "campo de",
    ] {
        if let Some(pos) = lower.find(noun) {
            return text[pos + noun.len()..].trim();
        }
    }
    match text.get("busca".len()..) {
        Some(rest) => rest.trim(),
        None => text.trim(),
    }
}
