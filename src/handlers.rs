/// Axum handlers for the tracker's pages and webhooks
use crate::AppState;
use crate::auth::{AuthenticationContext, Caller};
use crate::errors::AppError;
use crate::models::{AthleteDetail, AthleteList, DashboardPage, OnboardingPage};
use crate::params::{AthletePath, OrganizationPath, SessionQuery};
use crate::session_router::{Destination, decide};
use crate::tracker::{SessionFilter, SessionPage};
use crate::validation::{ValidatedPath, ValidatedQuery};
use crate::webhook::ORGANIZATION_DELETED;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Redirect,
};
use tracing::{debug, info, instrument};

const RECENT_SESSIONS: u32 = 5;

type PathParams<T> = Result<ValidatedPath<T>, AppError>;
type QueryParams<T> = Result<ValidatedQuery<T>, AppError>;

/// Checks an org-scoped request in order: signed in (401), path (400), member (403). Query
/// parameters are only looked at after this passes.
fn authorize<T: Organization>(
    context: &AuthenticationContext,
    path: PathParams<T>,
) -> Result<T, AppError> {
    context.user().ok_or(AppError::Unauthenticated)?;
    let ValidatedPath(path) = path?;
    context.require_member(path.organization_id())?;
    Ok(path)
}

trait Organization {
    fn organization_id(&self) -> &str;
}

impl Organization for OrganizationPath {
    fn organization_id(&self) -> &str {
        &self.organization_id
    }
}

impl Organization for AthletePath {
    fn organization_id(&self) -> &str {
        &self.organization_id
    }
}

/// Sends the caller to their organization's dashboard, or to onboarding.
#[instrument(skip_all)]
pub async fn root(State(state): State<AppState>, Caller(context): Caller) -> Redirect {
    let destination = decide(&context);
    let path = state.redirects.path_for(&destination);
    match destination {
        Destination::Organization(_) => debug!(%path, "Redirecting to organization"),
        Destination::Onboarding => debug!(%path, "Redirecting to onboarding"),
    }
    Redirect::to(&path)
}

#[instrument(skip_all)]
pub async fn onboarding(Caller(context): Caller) -> Json<OnboardingPage> {
    Json(OnboardingPage {
        signed_in: context.user().is_some(),
        user_id: context.user_id,
        next: "/".to_owned(),
    })
}

#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    Caller(context): Caller,
    path: PathParams<OrganizationPath>,
) -> Result<Json<DashboardPage>, AppError> {
    let path = authorize(&context, path)?;

    let athletes = state.store.list_athletes(&path.organization_id).await?;
    let recent = state
        .store
        .list_sessions(
            &path.organization_id,
            &SessionFilter {
                per_page: RECENT_SESSIONS,
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(DashboardPage {
        organization_id: path.organization_id,
        athlete_count: athletes.len(),
        session_count: recent.total,
        recent_sessions: recent.sessions,
    }))
}

#[instrument(skip_all)]
pub async fn athletes(
    State(state): State<AppState>,
    Caller(context): Caller,
    path: PathParams<OrganizationPath>,
) -> Result<Json<AthleteList>, AppError> {
    let path = authorize(&context, path)?;

    let athletes = state.store.list_athletes(&path.organization_id).await?;
    Ok(Json(AthleteList {
        organization_id: path.organization_id,
        athletes,
    }))
}

#[instrument(skip_all)]
pub async fn athlete(
    State(state): State<AppState>,
    Caller(context): Caller,
    path: PathParams<AthletePath>,
) -> Result<Json<AthleteDetail>, AppError> {
    let path = authorize(&context, path)?;

    let athlete = state
        .store
        .get_athlete(&path.organization_id, &path.athlete_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("athlete {}", path.athlete_id)))?;
    let recent_sessions = state
        .store
        .list_sessions(
            &path.organization_id,
            &SessionFilter {
                athlete_id: Some(path.athlete_id),
                per_page: RECENT_SESSIONS,
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(AthleteDetail {
        athlete,
        recent_sessions,
    }))
}

#[instrument(skip_all)]
pub async fn sessions(
    State(state): State<AppState>,
    Caller(context): Caller,
    path: PathParams<OrganizationPath>,
    query: QueryParams<SessionQuery>,
) -> Result<Json<SessionPage>, AppError> {
    let path = authorize(&context, path)?;
    let ValidatedQuery(query) = query?;

    let page = state
        .store
        .list_sessions(&path.organization_id, &SessionFilter::from(query))
        .await?;
    Ok(Json(page))
}

/// Receives identity provider events. Anything other than organization deletion is acknowledged
/// and otherwise ignored.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let event = state.webhooks.verify(&body, &headers)?;
    info!(event_type = %event.event_type, "Received webhook");

    if event.event_type == ORGANIZATION_DELETED {
        let organization_id = event
            .subject_id()
            .ok_or_else(|| AppError::BadRequest("organization.deleted without data.id".into()))?;
        let removed = state.store.remove_organization(organization_id).await?;
        info!(organization_id, removed, "Organization deleted");
    }

    Ok(StatusCode::NO_CONTENT)
}
