/// Athletes and training sessions, partitioned by organization.
///
/// Storage sits behind [`TrackerStore`] so a relational backend can replace the in-memory one.
/// The in-memory store is seeded from a JSON file shaped like [`SeedFile`].
use anyhow::anyhow;
use async_trait::async_trait;
use bon::Builder;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct Athlete {
    #[builder(into)]
    pub id: String,
    #[builder(into)]
    pub organization_id: String,
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub sport: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Planned,
    Completed,
    Skipped,
}

impl SessionStatus {
    pub const NAMES: [&'static str; 3] = ["planned", "completed", "skipped"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct TrainingSession {
    #[builder(into)]
    pub id: String,
    #[builder(into)]
    pub organization_id: String,
    #[builder(into)]
    pub athlete_id: String,
    /// Calendar date, `YYYY-MM-DD`. Compared lexically.
    #[builder(into)]
    pub date: String,
    #[builder(into)]
    pub kind: String,
    pub status: SessionStatus,
    pub duration_minutes: u32,
    #[builder(into)]
    pub notes: Option<String>,
}

/// Which sessions to list and which page of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilter {
    pub athlete_id: Option<String>,
    pub status: Option<SessionStatus>,
    /// Inclusive lower date bound.
    pub from: Option<String>,
    /// Inclusive upper date bound.
    pub to: Option<String>,
    /// 1-based.
    pub page: u32,
    pub per_page: u32,
}

impl Default for SessionFilter {
    fn default() -> Self {
        Self {
            athlete_id: None,
            status: None,
            from: None,
            to: None,
            page: 1,
            per_page: 20,
        }
    }
}

impl SessionFilter {
    fn matches(&self, session: &TrainingSession) -> bool {
        self.athlete_id
            .as_deref()
            .is_none_or(|id| session.athlete_id == id)
            && self.status.is_none_or(|status| session.status == status)
            && self
                .from
                .as_deref()
                .is_none_or(|from| session.date.as_str() >= from)
            && self
                .to
                .as_deref()
                .is_none_or(|to| session.date.as_str() <= to)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPage {
    pub sessions: Vec<TrainingSession>,
    pub page: u32,
    pub per_page: u32,
    /// Matching sessions across all pages.
    pub total: usize,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait TrackerStore: Send + Sync + std::fmt::Debug {
    async fn list_athletes(&self, organization_id: &str) -> Result<Vec<Athlete>, StoreError>;

    async fn get_athlete(
        &self,
        organization_id: &str,
        athlete_id: &str,
    ) -> Result<Option<Athlete>, StoreError>;

    /// Matching sessions, newest first.
    async fn list_sessions(
        &self,
        organization_id: &str,
        filter: &SessionFilter,
    ) -> Result<SessionPage, StoreError>;

    /// Drops everything held for an organization. Returns whether anything was removed.
    async fn remove_organization(&self, organization_id: &str) -> Result<bool, StoreError>;
}

/// The seed file: flat lists, each record naming its organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub athletes: Vec<Athlete>,
    #[serde(default)]
    pub sessions: Vec<TrainingSession>,
}

#[derive(Debug, Clone, Default)]
struct OrganizationData {
    athletes: Vec<Athlete>,
    sessions: Vec<TrainingSession>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    organizations: Arc<DashMap<String, OrganizationData>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_seed_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read data file {}: {}", path.display(), e))?;
        let seed: SeedFile = serde_json::from_str(&contents)
            .map_err(|e| anyhow!("Failed to parse data file {}: {}", path.display(), e))?;

        let store = Self::from_seed(seed);
        info!(
            "Loaded {} organizations from {}",
            store.organizations.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn from_seed(seed: SeedFile) -> Self {
        let store = Self::new();
        for athlete in seed.athletes {
            store.insert_athlete(athlete);
        }
        for session in seed.sessions {
            store.insert_session(session);
        }
        store
    }

    pub fn insert_athlete(&self, athlete: Athlete) {
        let mut data = self
            .organizations
            .entry(athlete.organization_id.clone())
            .or_default();
        data.athletes.retain(|a| a.id != athlete.id);
        data.athletes.push(athlete);
    }

    pub fn insert_session(&self, session: TrainingSession) {
        let mut data = self
            .organizations
            .entry(session.organization_id.clone())
            .or_default();
        data.sessions.retain(|s| s.id != session.id);
        data.sessions.push(session);
    }
}

#[async_trait]
impl TrackerStore for InMemoryStore {
    async fn list_athletes(&self, organization_id: &str) -> Result<Vec<Athlete>, StoreError> {
        let mut athletes = self
            .organizations
            .get(organization_id)
            .map(|data| data.athletes.clone())
            .unwrap_or_default();
        athletes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(athletes)
    }

    async fn get_athlete(
        &self,
        organization_id: &str,
        athlete_id: &str,
    ) -> Result<Option<Athlete>, StoreError> {
        Ok(self.organizations.get(organization_id).and_then(|data| {
            data.athletes
                .iter()
                .find(|a| a.id == athlete_id)
                .cloned()
        }))
    }

    async fn list_sessions(
        &self,
        organization_id: &str,
        filter: &SessionFilter,
    ) -> Result<SessionPage, StoreError> {
        let mut matching: Vec<TrainingSession> = self
            .organizations
            .get(organization_id)
            .map(|data| {
                data.sessions
                    .iter()
                    .filter(|s| filter.matches(s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));

        let total = matching.len();
        let per_page = filter.per_page.max(1);
        let skip = (filter.page.max(1) as usize - 1) * per_page as usize;
        let sessions = matching
            .into_iter()
            .skip(skip)
            .take(per_page as usize)
            .collect();

        Ok(SessionPage {
            sessions,
            page: filter.page,
            per_page,
            total,
        })
    }

    async fn remove_organization(&self, organization_id: &str) -> Result<bool, StoreError> {
        let removed = self.organizations.remove(organization_id).is_some();
        debug!(organization_id, removed, "Removed organization data");
        Ok(removed)
    }
}
