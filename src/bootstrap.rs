use std::fmt;
use std::future::Future;
use std::time::Duration;

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::time::Instant;

use crate::config::Config;
use crate::constants::{
    DEFAULT_DATABASE_NAME, NOTIFICATIONS_COLLECTION, SYSTEM_USER_ID, WELCOME_TITLE,
};
use crate::db::schema::{CollectionSpec, IndexSpec, UserSpec, COLLECTIONS};
use crate::db::AdminBackend;
use crate::error::{BootstrapError, Result, StepFailure};
use crate::models::{Notification, NotificationType};

/// Username shown by a preview plan when none is configured
const UNSET_USER: &str = "<APP_DB_USER>";

/// One unit of the bootstrap, executed in the order returned by `BootstrapPlan::steps`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    SelectDatabase,
    CreateUser,
    CreateCollection(&'static CollectionSpec),
    CreateIndex(&'static CollectionSpec, &'static IndexSpec),
    InsertSeed,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::SelectDatabase => write!(f, "select database"),
            Step::CreateUser => write!(f, "create user"),
            Step::CreateCollection(c) => write!(f, "create collection {}", c.name),
            Step::CreateIndex(c, i) => write!(f, "create index {}.{}", c.name, i.name()),
            Step::InsertSeed => write!(f, "insert welcome notification"),
        }
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Applied,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Outcome of every step attempted in one run
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub database: String,
    pub username: String,
    pub steps: Vec<StepRecord>,
}

impl BootstrapReport {
    fn new(plan: &BootstrapPlan) -> Self {
        Self {
            database: plan.database.clone(),
            username: plan.user.username.clone(),
            steps: Vec::new(),
        }
    }

    pub fn applied(&self) -> usize {
        self.count(StepStatus::Applied)
    }

    pub fn skipped(&self) -> usize {
        self.count(StepStatus::Skipped)
    }

    pub fn status_of(&self, step: &Step) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|record| record.step == *step)
            .map(|record| record.status)
    }

    fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|r| r.status == status).count()
    }
}

/// What a verification found absent or different
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub database: String,
    pub missing: Vec<String>,
}

impl VerifyReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Target database, application user and declared collections
#[derive(Debug, Clone)]
pub struct BootstrapPlan {
    pub database: String,
    pub user: UserSpec,
    pub collections: &'static [CollectionSpec],
}

impl BootstrapPlan {
    pub fn new(database: &str, username: &str, password: &str) -> Self {
        Self {
            database: database.to_string(),
            user: UserSpec::read_write(username, password, database),
            collections: COLLECTIONS,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.database_name, &config.app_user, &config.app_password)
    }

    /// Plan for display only; unset variables fall back to defaults and no
    /// password is needed
    pub fn preview<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let database =
            lookup("BOOTSTRAP_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());
        let username = lookup("APP_DB_USER").unwrap_or_else(|| UNSET_USER.to_string());
        Self::new(&database, &username, "")
    }

    pub fn steps(&self) -> Vec<Step> {
        let mut steps = vec![Step::SelectDatabase, Step::CreateUser];
        for collection in self.collections {
            steps.push(Step::CreateCollection(collection));
            steps.extend(
                collection
                    .indexes
                    .iter()
                    .map(|index| Step::CreateIndex(collection, index)),
            );
        }
        steps.push(Step::InsertSeed);
        steps
    }
}

/// Filter identifying the welcome notification
pub fn seed_filter() -> Document {
    doc! {
        "userId": SYSTEM_USER_ID,
        "type": NotificationType::System.as_str(),
        "title": WELCOME_TITLE,
    }
}

/// Run `fut`, failing with `Timeout` if it does not finish within `limit`
pub async fn with_timeout<T, E, F>(limit: Duration, fut: F) -> Result<std::result::Result<T, E>>
where
    F: Future<Output = std::result::Result<T, E>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| BootstrapError::Timeout(limit))
}

/// Applies a `BootstrapPlan` through an explicitly passed backend
pub struct Bootstrapper<'a, B: AdminBackend + ?Sized> {
    backend: &'a B,
    plan: &'a BootstrapPlan,
    /// Instant every step must finish by, and the overall limit it was derived from
    deadline: Option<(Instant, Duration)>,
}

impl<'a, B: AdminBackend + ?Sized> Bootstrapper<'a, B> {
    pub fn new(backend: &'a B, plan: &'a BootstrapPlan) -> Self {
        Self {
            backend,
            plan,
            deadline: None,
        }
    }

    /// Fail the step in progress with `Timeout(limit)` once `deadline` passes
    pub fn with_deadline(mut self, deadline: Instant, limit: Duration) -> Self {
        self.deadline = Some((deadline, limit));
        self
    }

    fn check_target(&self) -> Result<()> {
        if self.backend.database_name() != self.plan.database {
            return Err(BootstrapError::DatabaseMismatch {
                backend: self.backend.database_name().to_string(),
                plan: self.plan.database.clone(),
            });
        }
        Ok(())
    }

    async fn execute_within_deadline(
        &self,
        step: &Step,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        match self.deadline {
            Some((deadline, limit)) => tokio::time::timeout_at(deadline, self.execute(step, now))
                .await
                .map_err(|_| BootstrapError::Timeout(limit))?,
            None => self.execute(step, now).await,
        }
    }

    /// Execute every step in order
    ///
    /// Duplicates are logged and skipped. The first fatal error halts the run and
    /// is returned with the failing step and the steps completed before it.
    pub async fn run(&self, now: DateTime<Utc>) -> std::result::Result<BootstrapReport, StepFailure> {
        tracing::info!(
            "Bootstrapping database '{}' for user '{}'",
            self.plan.database,
            self.plan.user.username
        );

        let mut report = BootstrapReport::new(self.plan);

        if let Err(error) = self.check_target() {
            tracing::error!("{}", error);
            return Err(StepFailure {
                step: Step::SelectDatabase,
                error,
                report,
            });
        }

        for step in self.plan.steps() {
            let (status, reason) = match self.execute_within_deadline(&step, now).await {
                Ok(None) => {
                    tracing::info!("Applied: {}", step);
                    (StepStatus::Applied, None)
                }
                Ok(Some(reason)) => {
                    tracing::warn!("Skipped: {} ({})", step, reason);
                    (StepStatus::Skipped, Some(reason))
                }
                Err(BootstrapError::AlreadyExists(reason)) => {
                    tracing::warn!("Skipped: {} ({})", step, reason);
                    (StepStatus::Skipped, Some(reason))
                }
                Err(error) => {
                    tracing::error!("Step '{}' failed: {}", step, error);
                    return Err(StepFailure {
                        step,
                        error,
                        report,
                    });
                }
            };
            report.steps.push(StepRecord {
                step,
                status,
                reason,
            });
        }

        tracing::info!(
            "Bootstrap complete: {} applied, {} skipped",
            report.applied(),
            report.skipped()
        );

        Ok(report)
    }

    /// Returns `Some(reason)` when the step had nothing to do
    async fn execute(&self, step: &Step, now: DateTime<Utc>) -> Result<Option<String>> {
        match step {
            // The server creates the database lazily on first write
            Step::SelectDatabase => self.backend.ping().await?,
            Step::CreateUser => self.backend.create_user(&self.plan.user).await?,
            Step::CreateCollection(collection) => {
                self.backend.create_collection(collection.name).await?
            }
            Step::CreateIndex(collection, index) => {
                self.backend.create_index(collection.name, index).await?
            }
            Step::InsertSeed => {
                let existing = self
                    .backend
                    .count_documents(NOTIFICATIONS_COLLECTION, seed_filter())
                    .await?;
                if existing > 0 {
                    return Ok(Some("welcome notification already present".to_string()));
                }
                let welcome = bson::to_document(&Notification::welcome(now))?;
                self.backend
                    .insert_document(NOTIFICATIONS_COLLECTION, welcome)
                    .await?;
            }
        }
        Ok(None)
    }

    /// Read-only check that everything the plan declares is present
    pub async fn verify(&self) -> Result<VerifyReport> {
        self.check_target()?;

        let mut missing = Vec::new();
        let user = &self.plan.user;

        match self.backend.user_roles(&user.username).await? {
            None => missing.push(format!("user {}", user.username)),
            Some(mut roles) => {
                let mut expected = user.roles.clone();
                roles.sort_by(|a, b| (&a.db, &a.role).cmp(&(&b.db, &b.role)));
                expected.sort_by(|a, b| (&a.db, &a.role).cmp(&(&b.db, &b.role)));
                if roles != expected {
                    let found: Vec<String> =
                        roles.iter().map(|r| format!("{}@{}", r.role, r.db)).collect();
                    missing.push(format!(
                        "user {} role grant (found [{}])",
                        user.username,
                        found.join(", ")
                    ));
                }
            }
        }

        let collections = self.backend.list_collections().await?;
        for collection in self.plan.collections {
            if !collections.iter().any(|name| name == collection.name) {
                missing.push(format!("collection {}", collection.name));
                continue;
            }
            let indexes = self.backend.list_indexes(collection.name).await?;
            for index in collection.indexes {
                if !indexes.iter().any(|existing| existing.matches(index)) {
                    missing.push(format!("index {}.{}", collection.name, index.name()));
                }
            }
        }

        let seeded = self
            .backend
            .count_documents(NOTIFICATIONS_COLLECTION, seed_filter())
            .await?;
        if seeded == 0 {
            missing.push("welcome notification".to_string());
        }

        for item in &missing {
            tracing::warn!("Missing: {}", item);
        }

        Ok(VerifyReport {
            database: self.plan.database.clone(),
            missing,
        })
    }
}
