use serde::Serialize;

use crate::domain::{plan_catalog, Plan, SubscriptionTier};
use crate::session::SessionSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanCard {
    #[serde(flatten)]
    pub plan: Plan,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsState {
    pub current_tier: SubscriptionTier,
    pub plans: Vec<PlanCard>,
}

/// The plan catalog with the caller's current plan marked. Upgrading is not
/// offered from here.
pub fn settings(session: &SessionSnapshot) -> SettingsState {
    let current_tier = session.tier();
    let plans = plan_catalog()
        .into_iter()
        .map(|plan| PlanCard {
            current: plan.tier == current_tier,
            plan,
        })
        .collect();
    SettingsState { current_tier, plans }
}
