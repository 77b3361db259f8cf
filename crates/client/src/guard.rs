//! Page-entry authorization check.

use std::sync::Arc;

use policlinico_auth::{Requirement, explain};

use crate::config::Locations;
use crate::navigation::Navigator;
use crate::session_store::SessionStore;

/// Allows a protected page to render or sends the user elsewhere.
///
/// Call [`RouteGuard::guard`] exactly once per page load, before any protected
/// content is shown.
#[derive(Clone)]
pub struct RouteGuard {
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    locations: Locations,
}

impl RouteGuard {
    pub fn new(store: SessionStore, navigator: Arc<dyn Navigator>, locations: Locations) -> Self {
        Self {
            store,
            navigator,
            locations,
        }
    }

    /// Returns `true` when the page may render. Otherwise navigates and
    /// returns `false`.
    ///
    /// Authentication is checked before authorization: without a session the
    /// user goes to `redirect` (or the login page) even when `requirement` is
    /// `None`. An authenticated but unauthorized user goes to `redirect`, else
    /// their role dashboard, else the login page. Expired and never-signed-in
    /// sessions are indistinguishable here.
    pub fn guard(&self, requirement: &Requirement, redirect: Option<&str>) -> bool {
        let Some(session) = self.store.get_session() else {
            let target = redirect.unwrap_or(&self.locations.login);
            tracing::debug!(location = target, "no session, redirecting");
            self.navigator.navigate(target);
            return false;
        };

        let decision = explain(requirement, Some(&session));
        if decision.granted {
            return true;
        }

        let target = redirect
            .or_else(|| self.locations.dashboard_for(session.role()))
            .unwrap_or(&self.locations.login);
        tracing::debug!(
            location = target,
            role = %session.role(),
            reason = %decision.message(),
            "permission denied, redirecting"
        );
        self.navigator.navigate(target);
        false
    }
}
