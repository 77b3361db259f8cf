//! Navigation side effects.
//!
//! The route guard and the auth client decide *where* the user must go; how
//! that happens (a browser redirect, a router push, a line on a terminal) is
//! the embedder's business.

use std::sync::Mutex;

pub trait Navigator: Send + Sync {
    fn navigate(&self, location: &str);
}

/// Navigator that records every requested location.
///
/// Used by the command-line front end, which has no pages to switch, and by
/// tests asserting on redirects.
#[derive(Debug, Default)]
pub struct NavigationLog {
    visits: Mutex<Vec<String>>,
}

impl NavigationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<String> {
        self.visits.lock().ok().and_then(|v| v.last().cloned())
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Navigator for NavigationLog {
    fn navigate(&self, location: &str) {
        tracing::info!(location, "navigate");
        match self.visits.lock() {
            Ok(mut visits) => visits.push(location.to_string()),
            Err(poisoned) => poisoned.into_inner().push(location.to_string()),
        }
    }
}
