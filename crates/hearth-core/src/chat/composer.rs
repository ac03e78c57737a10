//! System prompt composition.

/// Placed between the profile and the preset so the model can tell the two
/// sources apart.
pub const SEGMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Build the system prompt from the persistent profile and a preset.
///
/// Each source is trimmed and skipped when empty; the profile is also skipped
/// when disabled. An empty result means no system message is sent.
pub fn compose(profile_enabled: bool, profile_text: &str, preset_text: &str) -> String {
    let profile = profile_text.trim();
    let preset = preset_text.trim();

    let mut segments = Vec::with_capacity(2);
    if profile_enabled && !profile.is_empty() {
        segments.push(profile);
    }
    if !preset.is_empty() {
        segments.push(preset);
    }
    segments.join(SEGMENT_SEPARATOR)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_profile_leaves_only_preset() {
        assert_eq!(compose(true, "", "Be concise."), "Be concise.");
        assert_eq!(compose(true, "  \n\t", "Be concise."), "Be concise.");
    }

    #[test]
    fn disabled_profile_is_excluded() {
        assert_eq!(compose(false, "X", "Y"), "Y");
    }

    #[test]
    fn both_sources_are_separated() {
        assert_eq!(compose(true, " X \n", "\nY "), "X\n\n---\n\nY");
    }

    #[test]
    fn nothing_to_say_yields_empty() {
        assert_eq!(compose(true, "", "   "), "");
        assert_eq!(compose(false, "X", ""), "");
    }

    #[test]
    fn profile_alone_has_no_separator() {
        assert_eq!(compose(true, "X", ""), "X");
    }

    #[test]
    fn composition_is_deterministic() {
        let a = compose(true, "profile", "preset");
        let b = compose(true, "profile", "preset");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }
}
