/// JSON documents returned by the page routes.
use serde::{Deserialize, Serialize};

use crate::tracker::{Athlete, SessionPage, TrainingSession};

/// Returned by `/onboarding`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OnboardingPage {
    pub signed_in: bool,
    pub user_id: Option<String>,
    /// Where to go once an organization has been created or joined.
    pub next: String,
}

/// Returned by `/org/{organization_id}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DashboardPage {
    pub organization_id: String,
    pub athlete_count: usize,
    /// Total sessions held for the organization.
    pub session_count: usize,
    pub recent_sessions: Vec<TrainingSession>,
}

/// Returned by `/org/{organization_id}/athletes`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AthleteList {
    pub organization_id: String,
    pub athletes: Vec<Athlete>,
}

/// Returned by `/org/{organization_id}/athletes/{athlete_id}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AthleteDetail {
    pub athlete: Athlete,
    pub recent_sessions: SessionPage,
}
