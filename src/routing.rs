//! Route authorization — which view a client may see for a given gate state.

use crate::onboarding::GateState;

/// Pages behind the dashboard layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardPage {
    Home,
    Connections,
    RunJob,
    Jobs,
}

/// Every navigable view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Public landing page with the sign-in button.
    Landing,
    /// Post-login landing that waits for the gate and forwards.
    Redirect,
    Onboarding,
    Dashboard(DashboardPage),
}

impl Route {
    pub const HOME: Route = Route::Dashboard(DashboardPage::Home);

    pub fn path(&self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::Redirect => "/redirect",
            Self::Onboarding => "/onboarding",
            Self::Dashboard(DashboardPage::Home) => "/dashboard",
            Self::Dashboard(DashboardPage::Connections) => "/dashboard/connections",
            Self::Dashboard(DashboardPage::RunJob) => "/dashboard/run-job",
            Self::Dashboard(DashboardPage::Jobs) => "/dashboard/jobs",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let trimmed = path.trim_end_matches('/');
        let route = match if trimmed.is_empty() { "/" } else { trimmed } {
            "/" => Self::Landing,
            "/redirect" => Self::Redirect,
            "/onboarding" => Self::Onboarding,
            "/dashboard" => Self::HOME,
            "/dashboard/connections" => Self::Dashboard(DashboardPage::Connections),
            "/dashboard/run-job" => Self::Dashboard(DashboardPage::RunJob),
            "/dashboard/jobs" => Self::Dashboard(DashboardPage::Jobs),
            _ => return None,
        };
        Some(route)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// What to do with a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Render(Route),
    Redirect(Route),
    /// The gate has not settled yet; show a spinner.
    Wait,
    /// The gate failed; show the message and do not render the view.
    Blocked(String),
}

/// Decide what a navigation to `route` yields under `gate`.
pub fn resolve(route: Route, gate: &GateState) -> RouteDecision {
    use GateState as G;
    use RouteDecision::*;

    match (route, gate) {
        (Route::Landing, _) => Render(Route::Landing),

        (_, G::Unauthenticated) => Redirect(Route::Landing),
        (_, G::Unknown | G::Checking) => Wait,
        (_, G::Error(msg)) => Blocked(msg.clone()),

        (Route::Redirect, G::Ready) => Redirect(Route::HOME),
        (Route::Redirect, G::NeedsOnboarding) => Redirect(Route::Onboarding),

        (Route::Onboarding, G::NeedsOnboarding) => Render(Route::Onboarding),
        (Route::Onboarding, G::Ready) => Redirect(Route::HOME),

        (Route::Dashboard(page), G::Ready) => Render(Route::Dashboard(page)),
        (Route::Dashboard(_), G::NeedsOnboarding) => Redirect(Route::Onboarding),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGES: [DashboardPage; 4] = [
        DashboardPage::Home,
        DashboardPage::Connections,
        DashboardPage::RunJob,
        DashboardPage::Jobs,
    ];

    #[test]
    fn dashboard_requires_ready() {
        for page in PAGES {
            let route = Route::Dashboard(page);
            assert_eq!(resolve(route, &GateState::Ready), RouteDecision::Render(route));
            assert_eq!(
                resolve(route, &GateState::NeedsOnboarding),
                RouteDecision::Redirect(Route::Onboarding)
            );
            assert_eq!(
                resolve(route, &GateState::Unauthenticated),
                RouteDecision::Redirect(Route::Landing)
            );
            assert_eq!(resolve(route, &GateState::Checking), RouteDecision::Wait);
            assert_eq!(resolve(route, &GateState::Unknown), RouteDecision::Wait);
            assert_eq!(
                resolve(route, &GateState::Error("down".into())),
                RouteDecision::Blocked("down".into())
            );
        }
    }

    #[test]
    fn redirect_page_forwards_once_settled() {
        assert_eq!(resolve(Route::Redirect, &GateState::Checking), RouteDecision::Wait);
        assert_eq!(
            resolve(Route::Redirect, &GateState::Ready),
            RouteDecision::Redirect(Route::HOME)
        );
        assert_eq!(
            resolve(Route::Redirect, &GateState::NeedsOnboarding),
            RouteDecision::Redirect(Route::Onboarding)
        );
    }

    #[test]
    fn onboarding_route() {
        assert_eq!(
            resolve(Route::Onboarding, &GateState::NeedsOnboarding),
            RouteDecision::Render(Route::Onboarding)
        );
        assert_eq!(
            resolve(Route::Onboarding, &GateState::Ready),
            RouteDecision::Redirect(Route::HOME)
        );
        assert_eq!(
            resolve(Route::Onboarding, &GateState::Unauthenticated),
            RouteDecision::Redirect(Route::Landing)
        );
    }

    #[test]
    fn landing_always_renders() {
        assert_eq!(
            resolve(Route::Landing, &GateState::Error("x".into())),
            RouteDecision::Render(Route::Landing)
        );
    }

    #[test]
    fn paths_round_trip() {
        for route in [Route::Landing, Route::Redirect, Route::Onboarding]
            .into_iter()
            .chain(PAGES.map(Route::Dashboard))
        {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/dashboard/"), Some(Route::HOME));
        assert_eq!(Route::from_path("/admin"), None);
    }
}
