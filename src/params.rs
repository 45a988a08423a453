//! Declared parameter shapes for each route
use crate::tracker::{SessionFilter, SessionStatus};
use crate::validation::{Field, FieldType, Presence, Refinement, Schema, Shape, Validated};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("identifier pattern is valid"));

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("date pattern is valid")
});

/// Longest organization identifier accepted in a path.
pub const MAX_ORGANIZATION_ID: usize = 255;

fn identifier(name: &str) -> Field {
    Field::builder()
        .name(name)
        .ty(FieldType::String)
        .refinements(vec![Refinement::Pattern(IDENTIFIER.clone())])
        .build()
}

/// Organization identifiers are issued by the identity provider, so any non-empty value that the
/// redirect on `/` can produce is accepted.
fn organization_id() -> Field {
    Field::builder()
        .name("organization_id")
        .ty(FieldType::String)
        .refinements(vec![
            Refinement::NonEmpty,
            Refinement::MaxLength(MAX_ORGANIZATION_ID),
        ])
        .build()
}

fn optional_identifier(name: &str) -> Field {
    Field::builder()
        .name(name)
        .ty(FieldType::String)
        .presence(Presence::Optional)
        .refinements(vec![Refinement::Pattern(IDENTIFIER.clone())])
        .build()
}

fn optional_date(name: &str) -> Field {
    Field::builder()
        .name(name)
        .ty(FieldType::String)
        .presence(Presence::Optional)
        .refinements(vec![Refinement::Pattern(DATE.clone())])
        .build()
}

/// `/org/{organization_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationPath {
    pub organization_id: String,
}

static ORGANIZATION_PATH: LazyLock<Schema<OrganizationPath>> =
    LazyLock::new(|| Schema::new(Shape::closed().with(organization_id())));

impl Validated for OrganizationPath {
    fn schema() -> &'static Schema<Self> {
        &ORGANIZATION_PATH
    }
}

/// `/org/{organization_id}/athletes/{athlete_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct AthletePath {
    pub organization_id: String,
    pub athlete_id: String,
}

static ATHLETE_PATH: LazyLock<Schema<AthletePath>> = LazyLock::new(|| {
    Schema::new(
        Shape::closed()
            .with(organization_id())
            .with(identifier("athlete_id")),
    )
});

impl Validated for AthletePath {
    fn schema() -> &'static Schema<Self> {
        &ATHLETE_PATH
    }
}

/// Query for `/org/{organization_id}/sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionQuery {
    pub athlete_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

pub const MAX_PER_PAGE: u32 = 100;

static SESSION_QUERY: LazyLock<Schema<SessionQuery>> = LazyLock::new(|| {
    Schema::new(
        Shape::closed()
            .with(optional_identifier("athlete_id"))
            .with(Field::optional(
                "status",
                FieldType::Enum(SessionStatus::NAMES.to_vec()),
            ))
            .with(optional_date("from"))
            .with(optional_date("to"))
            .with(
                Field::builder()
                    .name("page")
                    .ty(FieldType::Integer)
                    .presence(Presence::Default(json!(1)))
                    .refinements(vec![Refinement::Min(1.0), Refinement::Max(10_000.0)])
                    .build(),
            )
            .with(
                Field::builder()
                    .name("per_page")
                    .ty(FieldType::Integer)
                    .presence(Presence::Default(json!(20)))
                    .refinements(vec![
                        Refinement::Min(1.0),
                        Refinement::Max(f64::from(MAX_PER_PAGE)),
                    ])
                    .build(),
            ),
    )
});

impl Validated for SessionQuery {
    fn schema() -> &'static Schema<Self> {
        &SESSION_QUERY
    }
}

impl From<SessionQuery> for SessionFilter {
    fn from(query: SessionQuery) -> Self {
        SessionFilter {
            athlete_id: query.athlete_id,
            status: query.status,
            from: query.from,
            to: query.to,
            page: query.page,
            per_page: query.per_page,
        }
    }
}
