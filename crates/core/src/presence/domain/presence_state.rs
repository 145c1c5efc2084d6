use serde::{Deserialize, Serialize};

/// Debounced presence of one person.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    #[default]
    Absent,
    Entering,
    Present,
    Exiting,
}

impl PresenceState {
    pub const ALL: &[PresenceState] = &[
        PresenceState::Absent,
        PresenceState::Entering,
        PresenceState::Present,
        PresenceState::Exiting,
    ];

    /// Whether the person belongs in the present set. An exit is only
    /// final once it commits, so `Exiting` still counts.
    pub fn counts_as_present(&self) -> bool {
        matches!(self, PresenceState::Present | PresenceState::Exiting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceState::Absent => "absent",
            PresenceState::Entering => "entering",
            PresenceState::Present => "present",
            PresenceState::Exiting => "exiting",
        }
    }
}

impl std::fmt::Display for PresenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_absent() {
        assert_eq!(PresenceState::default(), PresenceState::Absent);
    }

    #[test]
    fn test_counts_as_present_until_exit_commits() {
        let present: Vec<_> = PresenceState::ALL
            .iter()
            .filter(|s| s.counts_as_present())
            .copied()
            .collect();
        assert_eq!(present, vec![PresenceState::Present, PresenceState::Exiting]);
    }

    #[test]
    fn test_display_matches_serialized_form() {
        for state in PresenceState::ALL {
            let json = serde_json::to_string(state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}
