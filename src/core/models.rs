//! Fixed catalog of Gemini models selectable in the UI.

pub struct ModelSpec {
    pub display_name: &'static str,
    pub id: &'static str,
}

/// Models offered in the new-chat picker, in display order.
pub const AVAILABLE_MODELS: &[ModelSpec] = &[
    ModelSpec {
        display_name: "Gemini 2.5 Pro",
        id: "models/gemini-2.5-pro",
    },
    ModelSpec {
        display_name: "Gemini 2.5 Flash",
        id: "models/gemini-2.5-flash",
    },
    ModelSpec {
        display_name: "Gemini 1.5 Pro",
        id: "models/gemini-1.5-pro-latest",
    },
    ModelSpec {
        display_name: "Gemini 1.5 Flash",
        id: "models/gemini-1.5-flash-latest",
    },
];

/// Models known not to support search grounding. The UI disables the toggle
/// for these and the gateway forces the effective flag to false.
const GROUNDING_UNSUPPORTED: &[&str] = &["models/gemini-2.5-pro", "models/gemini-2.5-flash"];

pub fn default_model_id() -> &'static str {
    AVAILABLE_MODELS[0].id
}

pub fn supports_grounding(model_id: &str) -> bool {
    !GROUNDING_UNSUPPORTED.contains(&model_id)
}

/// The grounding flag that actually takes effect for a model, regardless of
/// what the user toggled.
pub fn effective_grounding(model_id: &str, requested: bool) -> bool {
    requested && supports_grounding(model_id)
}

pub fn display_name_for(model_id: &str) -> &'static str {
    AVAILABLE_MODELS
        .iter()
        .find(|m| m.id == model_id)
        .map(|m| m.display_name)
        .unwrap_or("Unknown Model")
}

/// Resolve user input (display name or API id, case-insensitive) to an API id.
pub fn resolve(name_or_id: &str) -> Option<&'static str> {
    AVAILABLE_MODELS
        .iter()
        .find(|m| {
            m.id.eq_ignore_ascii_case(name_or_id)
                || m.display_name.eq_ignore_ascii_case(name_or_id)
        })
        .map(|m| m.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grounding_deny_list_overrides_request() {
        assert!(!effective_grounding("models/gemini-2.5-pro", true));
        assert!(!effective_grounding("models/gemini-2.5-flash", true));
        assert!(effective_grounding("models/gemini-1.5-pro-latest", true));
        assert!(!effective_grounding("models/gemini-1.5-pro-latest", false));
    }

    #[test]
    fn display_name_lookup_falls_back_to_unknown() {
        assert_eq!(display_name_for("models/gemini-2.5-pro"), "Gemini 2.5 Pro");
        assert_eq!(display_name_for("models/retired-model"), "Unknown Model");
    }

    #[test]
    fn resolve_accepts_display_name_or_id() {
        assert_eq!(resolve("Gemini 1.5 Flash"), Some("models/gemini-1.5-flash-latest"));
        assert_eq!(resolve("models/gemini-2.5-pro"), Some("models/gemini-2.5-pro"));
        assert_eq!(resolve("gemini 2.5 pro"), Some("models/gemini-2.5-pro"));
        assert_eq!(resolve("gpt-4o"), None);
    }
}
