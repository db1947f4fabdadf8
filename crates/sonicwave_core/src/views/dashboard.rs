//! The dashboard: plan summary and the project list.

use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::{format_allowance, Phase};
use crate::domain::{Project, SubscriptionTier};
use crate::ports::DatabaseService;
use crate::session::SessionSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardState {
    pub greeting_name: String,
    pub plan: SubscriptionTier,
    pub plan_name: &'static str,
    pub characters_allowance: String,
    pub projects: Vec<Project>,
    pub loading: bool,
    pub error: Option<String>,
    /// The project whose delete is in flight; its control is disabled.
    pub deleting: Option<Uuid>,
}

impl DashboardState {
    pub fn phase(&self) -> Phase {
        Phase::of(self.loading, self.error.as_deref())
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}

pub struct Dashboard {
    db: Arc<dyn DatabaseService>,
    state: DashboardState,
}

impl Dashboard {
    pub fn new(db: Arc<dyn DatabaseService>, session: &SessionSnapshot) -> Self {
        let plan = session.tier();
        Self {
            db,
            state: DashboardState {
                greeting_name: session.display_name().to_string(),
                plan,
                plan_name: plan.display_name(),
                characters_allowance: format_allowance(plan.limits().characters_per_month),
                projects: Vec::new(),
                loading: true,
                error: None,
                deleting: None,
            },
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn into_state(self) -> DashboardState {
        self.state
    }

    /// Fetches the project list, newest first.
    pub async fn load(&mut self) {
        self.state.error = None;
        match self.db.list_projects().await {
            Ok(projects) => self.state.projects = projects,
            Err(e) => {
                error!("Failed to load projects: {}", e);
                self.state.error = Some("Failed to load projects".to_string());
            }
        }
        self.state.loading = false;
    }

    /// Deletes `id` and drops it from the local list once the backend confirms.
    /// Returns whether the project was deleted.
    pub async fn delete_project(&mut self, id: Uuid) -> bool {
        self.state.deleting = Some(id);
        let result = self.db.delete_project(id).await;
        self.state.deleting = None;

        match result {
            Ok(()) => {
                self.state.projects.retain(|p| p.id != id);
                true
            }
            Err(e) => {
                error!("Failed to delete project {}: {}", id, e);
                self.state.error = Some("Failed to delete project".to_string());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortError;
    use crate::testing::{InMemoryBackend, Op};
    use chrono::{Duration, Utc};

    fn signed_out() -> SessionSnapshot {
        SessionSnapshot {
            identity: None,
            profile: None,
            loading: false,
            error: None,
        }
    }

    #[tokio::test]
    async fn projects_are_listed_newest_first() {
        let backend = InMemoryBackend::new();
        let owner = Uuid::new_v4();
        let base = Utc::now();
        backend.seed_project(owner, "middle", base - Duration::days(1));
        backend.seed_project(owner, "newest", base);
        backend.seed_project(owner, "oldest", base - Duration::days(2));

        let mut dashboard = Dashboard::new(Arc::new(backend.clone()), &signed_out());
        assert_eq!(dashboard.state().phase(), Phase::Loading);
        dashboard.load().await;

        let titles: Vec<_> = dashboard.state().projects.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["newest", "middle", "oldest"]);
        assert_eq!(dashboard.state().phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn failed_load_sets_the_error() {
        let backend = InMemoryBackend::new();
        backend.fail_next(Op::ListProjects, PortError::Unexpected("timeout".into()));
        let mut dashboard = Dashboard::new(Arc::new(backend), &signed_out());
        dashboard.load().await;

        assert_eq!(dashboard.state().error.as_deref(), Some("Failed to load projects"));
        assert_eq!(dashboard.state().phase(), Phase::Error);
    }

    #[tokio::test]
    async fn delete_removes_the_project_only_on_success() {
        let backend = InMemoryBackend::new();
        let owner = Uuid::new_v4();
        let keep = backend.seed_project(owner, "keep", Utc::now() - Duration::hours(1));
        let drop_me = backend.seed_project(owner, "drop", Utc::now());
        let mut dashboard = Dashboard::new(Arc::new(backend.clone()), &signed_out());
        dashboard.load().await;

        backend.fail_next(Op::DeleteProject, PortError::Unauthorized("not yours".into()));
        assert!(!dashboard.delete_project(drop_me.id).await);
        assert_eq!(dashboard.state().project_count(), 2);
        assert_eq!(dashboard.state().error.as_deref(), Some("Failed to delete project"));
        assert!(dashboard.state().deleting.is_none());

        assert!(dashboard.delete_project(drop_me.id).await);
        let ids: Vec<_> = dashboard.state().projects.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![keep.id]);
        assert_eq!(backend.projects().len(), 1);
    }

    #[test]
    fn plan_summary_defaults_to_free() {
        let backend = InMemoryBackend::new();
        let state = Dashboard::new(Arc::new(backend), &signed_out()).into_state();
        assert_eq!(state.plan, SubscriptionTier::Free);
        assert_eq!(state.plan_name, "Free");
        assert_eq!(state.characters_allowance, "10,000");
        assert_eq!(state.greeting_name, "User");
    }

    #[test]
    fn team_plan_is_unlimited() {
        let backend = InMemoryBackend::new();
        let id = Uuid::new_v4();
        let profile = backend.seed_profile(id, Some("Ada"), SubscriptionTier::Team);
        let session = SessionSnapshot {
            identity: Some(InMemoryBackend::identity(id, "ada@example.com")),
            profile: Some(profile),
            loading: false,
            error: None,
        };
        let state = Dashboard::new(Arc::new(backend), &session).into_state();
        assert_eq!(state.characters_allowance, "Unlimited");
        assert_eq!(state.greeting_name, "Ada");
    }
}
