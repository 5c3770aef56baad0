// session-store/src/snapshot.rs
use common::{Identity, Profile, Session};

use crate::state::{Phase, ProfileStatus};

/// Immutable view of the store handed to consumers
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            phase: Phase::Initializing,
            session: None,
            profile: None,
        }
    }
}

impl SessionSnapshot {
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|session| &session.identity)
    }

    pub fn is_initializing(&self) -> bool {
        self.phase == Phase::Initializing
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.phase, Phase::Authenticated(_))
    }

    pub fn profile_status(&self) -> Option<ProfileStatus> {
        match self.phase {
            Phase::Authenticated(status) => Some(status),
            _ => None,
        }
    }

    fn display_name(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|profile| profile.display_name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Letter shown in the avatar badge: display name, then email, then `U`
    pub fn badge_initial(&self) -> char {
        self.display_name()
            .and_then(|name| name.chars().next())
            .or_else(|| self.identity().and_then(|identity| identity.email.chars().next()))
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('U')
    }

    /// Name shown next to the badge: display name, then the email's local part, then `User`
    pub fn menu_label(&self) -> String {
        if let Some(name) = self.display_name() {
            return name.to_string();
        }

        self.identity()
            .and_then(|identity| identity.email.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn signed_in(display_name: Option<&str>) -> SessionSnapshot {
        let id = Uuid::new_v4();
        let now = Utc::now();
        SessionSnapshot {
            phase: Phase::Authenticated(ProfileStatus::Ready),
            session: Some(Session {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                expires_at: now + Duration::hours(1),
                identity: Identity {
                    id,
                    email: "ann.lee@example.com".to_string(),
                },
            }),
            profile: Some(Profile {
                id,
                email: "ann.lee@example.com".to_string(),
                display_name: display_name.map(str::to_string),
                avatar: None,
                created_at: now,
                updated_at: now,
            }),
        }
    }

    #[test]
    fn test_display_name_wins() {
        let snapshot = signed_in(Some("zoe Park"));
        assert_eq!(snapshot.badge_initial(), 'Z');
        assert_eq!(snapshot.menu_label(), "zoe Park");
    }

    #[test]
    fn test_badge_initial_uppercases_any_letter() {
        let snapshot = signed_in(Some("élodie Martin"));
        assert_eq!(snapshot.badge_initial(), 'É');

        let snapshot = signed_in(Some("ßabine"));
        assert_eq!(snapshot.badge_initial(), 'S');
    }

    #[test]
    fn test_falls_back_to_email() {
        let mut snapshot = signed_in(Some("   "));
        assert_eq!(snapshot.badge_initial(), 'A');
        assert_eq!(snapshot.menu_label(), "ann.lee");

        // Degraded view while the profile is unavailable
        snapshot.profile = None;
        snapshot.phase = Phase::Authenticated(ProfileStatus::Unavailable);
        assert_eq!(snapshot.badge_initial(), 'A');
        assert_eq!(snapshot.menu_label(), "ann.lee");
    }

    #[test]
    fn test_anonymous_defaults() {
        let snapshot = SessionSnapshot::default();
        assert!(snapshot.is_initializing());
        assert!(!snapshot.is_authenticated());
        assert_eq!(snapshot.badge_initial(), 'U');
        assert_eq!(snapshot.menu_label(), "User");
        assert_eq!(snapshot.profile_status(), None);
    }

    #[test]
    fn test_profile_status_only_when_authenticated() {
        let mut snapshot = signed_in(None);
        assert_eq!(snapshot.profile_status(), Some(ProfileStatus::Ready));

        snapshot.phase = Phase::Unauthenticated;
        assert_eq!(snapshot.profile_status(), None);
    }
}
