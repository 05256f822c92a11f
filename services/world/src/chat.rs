//! chat
//!
//! Helpers for the chat traffic the realm answers itself. Whisper
//! targets may carry a realm suffix (`Name-Realm`) so a player can reach
//! a contact on another realm of the cluster; everything past routing
//! (say/yell ranges, channels, emotes) belongs to the world node.

/// A whisper recipient, split into character name and optional realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhisperTarget {
    pub name: String,
    pub realm: Option<String>,
}

impl WhisperTarget {
    /// Splits `Name-Realm` at the first dash. Realm names themselves may
    /// contain dashes, so everything after the first one is the realm.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('-') {
            Some((name, realm)) if !realm.is_empty() => Self {
                name: name.to_string(),
                realm: Some(realm.to_string()),
            },
            _ => Self {
                name: raw.to_string(),
                realm: None,
            },
        }
    }

    /// Whether this target lives on `local_realm` (no suffix counts as
    /// local).
    pub fn is_local(&self, local_realm: &str) -> bool {
        match &self.realm {
            None => true,
            Some(realm) => realm.eq_ignore_ascii_case(local_realm),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_names_have_no_realm() {
        let target = WhisperTarget::parse("Thrall");
        assert_eq!(target.name, "Thrall");
        assert_eq!(target.realm, None);
        assert!(target.is_local("Aegis EU"));
    }

    #[test]
    fn suffixed_names_split_at_the_first_dash() {
        let target = WhisperTarget::parse("Thrall-Aegis-West");
        assert_eq!(target.name, "Thrall");
        assert_eq!(target.realm.as_deref(), Some("Aegis-West"));
        assert!(!target.is_local("Aegis EU"));
        assert!(target.is_local("aegis-west"));
    }

    #[test]
    fn trailing_dash_is_treated_as_local() {
        let target = WhisperTarget::parse("Thrall-");
        assert_eq!(target.name, "Thrall-");
        assert!(target.is_local("anything"));
    }
}
