//! In-memory sites for embedding and tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::core::hook::{HookOccurrence, Site, SiteSource};
use crate::core::AppResult;

/// Site whose hooks are held in memory and can be replaced at any time.
#[derive(Debug)]
pub struct StaticSite {
    id: String,
    hooks: RwLock<Vec<HookOccurrence>>,
}

impl StaticSite {
    /// Create a site with no hooks.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// Add a hook occurrence at the end of the site's order.
    #[must_use]
    pub fn with_hook(self, name: impl Into<String>, due: DateTime<Utc>) -> Self {
        self.hooks.write().push(HookOccurrence::new(name, due));
        self
    }

    /// Replace all hooks.
    pub fn set_hooks(&self, hooks: Vec<HookOccurrence>) {
        *self.hooks.write() = hooks;
    }

    /// Remove every occurrence of `name`, as a site does once a hook ran.
    pub fn remove_hook(&self, name: &str) {
        self.hooks.write().retain(|hook| hook.name != name);
    }
}

impl Site for StaticSite {
    fn id(&self) -> &str {
        &self.id
    }

    fn pending_hooks(&self) -> AppResult<Vec<HookOccurrence>> {
        Ok(self.hooks.read().clone())
    }
}

/// Fixed, replaceable list of sites.
#[derive(Default)]
pub struct StaticSiteSource {
    sites: RwLock<Vec<Arc<dyn Site>>>,
}

impl StaticSiteSource {
    /// Create an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a site.
    pub fn add(&self, site: Arc<dyn Site>) {
        self.sites.write().push(site);
    }

    /// Remove a site by id.
    pub fn remove(&self, id: &str) {
        self.sites.write().retain(|site| site.id() != id);
    }

    /// Number of sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.read().len()
    }

    /// Whether there are no sites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.read().is_empty()
    }
}

impl FromIterator<Arc<dyn Site>> for StaticSiteSource {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Site>>>(iter: I) -> Self {
        Self {
            sites: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl SiteSource for StaticSiteSource {
    fn sites(&self) -> AppResult<Vec<Arc<dyn Site>>> {
        Ok(self.sites.read().clone())
    }
}

impl std::fmt::Debug for StaticSiteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.sites.read().iter().map(|s| s.id().to_owned()).collect();
        f.debug_struct("StaticSiteSource").field("sites", &ids).finish()
    }
}
