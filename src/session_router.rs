//! Where to send a signed-in caller
//!
//! The decision is made once per request from an already-resolved [`AuthenticationContext`]: a
//! caller with an active organization goes to that organization's pages, anyone else goes to
//! onboarding. Failures of the authentication lookup never reach this module.
use crate::auth::AuthenticationContext;
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the organization identifier in the organization path template.
pub const ORGANIZATION_PLACEHOLDER: &str = "{organization_id}";

/// The outcome of the routing decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Organization(String),
    Onboarding,
}

/// Chooses a destination for `context`. An empty organization identifier counts as none.
pub fn decide(context: &AuthenticationContext) -> Destination {
    match context.active_organization() {
        Some(organization_id) => Destination::Organization(organization_id.to_owned()),
        None => Destination::Onboarding,
    }
}

/// The two redirect targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectPaths {
    /// Must contain [`ORGANIZATION_PLACEHOLDER`].
    pub organization: String,
    pub onboarding: String,
}

impl Default for RedirectPaths {
    fn default() -> Self {
        Self {
            organization: format!("/org/{ORGANIZATION_PLACEHOLDER}"),
            onboarding: "/onboarding".to_owned(),
        }
    }
}

impl RedirectPaths {
    pub fn new(
        organization: impl Into<String>,
        onboarding: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let paths = Self {
            organization: organization.into(),
            onboarding: onboarding.into(),
        };
        if !paths.organization.contains(ORGANIZATION_PLACEHOLDER) {
            anyhow::bail!(
                "organization path '{}' must contain {}",
                paths.organization,
                ORGANIZATION_PLACEHOLDER
            );
        }
        for path in [&paths.organization, &paths.onboarding] {
            if !path.starts_with('/') {
                anyhow::bail!("redirect path '{path}' must start with '/'");
            }
        }
        Ok(paths)
    }

    /// The path for `destination`. Organization identifiers are percent-encoded.
    pub fn path_for(&self, destination: &Destination) -> String {
        match destination {
            Destination::Organization(id) => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
                self.organization
                    .replace(ORGANIZATION_PLACEHOLDER, &encoded.replace('+', "%20"))
            }
            Destination::Onboarding => self.onboarding.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn context(organization_id: Option<&str>) -> AuthenticationContext {
        AuthenticationContext {
            user_id: Some("user_1".into()),
            organization_id: organization_id.map(String::from),
        }
    }

    #[rstest]
    #[case(Some("org_123"), Destination::Organization("org_123".into()))]
    #[case(None, Destination::Onboarding)]
    #[case(Some(""), Destination::Onboarding)]
    fn test_decide(#[case] organization_id: Option<&str>, #[case] expected: Destination) {
        assert_eq!(decide(&context(organization_id)), expected);
    }

    #[test]
    fn test_anonymous_caller_goes_to_onboarding() {
        assert_eq!(
            decide(&AuthenticationContext::anonymous()),
            Destination::Onboarding
        );
    }

    #[test]
    fn test_default_paths() {
        let paths = RedirectPaths::default();
        assert_eq!(
            paths.path_for(&Destination::Organization("org_123".into())),
            "/org/org_123"
        );
        assert_eq!(paths.path_for(&Destination::Onboarding), "/onboarding");
    }

    #[test]
    fn test_organization_id_is_encoded() {
        let paths = RedirectPaths::default();
        assert_eq!(
            paths.path_for(&Destination::Organization("a/b c".into())),
            "/org/a%2Fb%20c"
        );
    }

    #[test]
    fn test_custom_paths_are_checked() {
        let paths = RedirectPaths::new("/teams/{organization_id}/dashboard", "/welcome").unwrap();
        assert_eq!(
            paths.path_for(&Destination::Organization("org_9".into())),
            "/teams/org_9/dashboard"
        );
        assert!(RedirectPaths::new("/teams", "/welcome").is_err());
        assert!(RedirectPaths::new("/org/{organization_id}", "welcome").is_err());
    }
}
