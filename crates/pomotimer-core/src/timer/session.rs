use serde::{Deserialize, Serialize};

/// A named countdown phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Session {
    Work,
    ShortBreak,
    LongBreak,
}

impl Session {
    /// Identifier used in events and the persisted blob's vocabulary.
    pub fn as_str(self) -> &'static str {
        match self {
            Session::Work => "work",
            Session::ShortBreak => "shortBreak",
            Session::LongBreak => "longBreak",
        }
    }

    /// Human-readable title.
    pub fn label(self) -> &'static str {
        match self {
            Session::Work => "Work Session",
            Session::ShortBreak => "Short Break",
            Session::LongBreak => "Long Break",
        }
    }

    pub fn is_break(self) -> bool {
        !matches!(self, Session::Work)
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_camel_case() {
        let json = serde_json::to_string(&Session::ShortBreak).unwrap();
        assert_eq!(json, "\"shortBreak\"");
        let parsed: Session = serde_json::from_str("\"longBreak\"").unwrap();
        assert_eq!(parsed, Session::LongBreak);
    }

    #[test]
    fn display_matches_identifier() {
        assert_eq!(Session::Work.to_string(), "work");
        assert_eq!(Session::LongBreak.label(), "Long Break");
        assert!(Session::ShortBreak.is_break());
        assert!(!Session::Work.is_break());
    }
}
