//! Sites, their hook occurrences, and the key that deduplicates them.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::AppResult;
use crate::util::clock::truncate_to_minute;

/// One pending instance of a named hook on a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookOccurrence {
    /// Hook name.
    pub name: String,
    /// When the hook is due to run.
    pub due: DateTime<Utc>,
}

impl HookOccurrence {
    /// Create an occurrence.
    pub fn new(name: impl Into<String>, due: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            due,
        }
    }

    /// Whether the occurrence is due at `now`.
    #[must_use]
    pub fn is_waiting(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }
}

/// Identity of one schedulable occurrence: site, hook name and the due time
/// truncated to the minute.
///
/// Rescans that report the same occurrence with slightly different due-time
/// precision collapse onto the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookKey {
    site: String,
    hook: String,
    minute: DateTime<Utc>,
}

impl HookKey {
    /// Build the key for `hook` on the site identified by `site`.
    #[must_use]
    pub fn new(site: &str, hook: &HookOccurrence) -> Self {
        Self {
            site: site.to_owned(),
            hook: hook.name.clone(),
            minute: truncate_to_minute(hook.due),
        }
    }

    /// Site identity.
    #[must_use]
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Hook name.
    #[must_use]
    pub fn hook(&self) -> &str {
        &self.hook
    }

    /// Minute the occurrence is due in.
    #[must_use]
    pub const fn minute(&self) -> DateTime<Utc> {
        self.minute
    }
}

impl fmt::Display for HookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.site,
            self.hook,
            self.minute.format("%Y-%m-%dT%H:%MZ")
        )
    }
}

/// A managed site that owns hook occurrences.
pub trait Site: Send + Sync {
    /// Stable identity of the site.
    fn id(&self) -> &str;

    /// Every occurrence the site currently knows about, including ones due in
    /// the future, in the site's own order.
    ///
    /// # Errors
    ///
    /// Returns an error when the site's hook data cannot be read.
    fn pending_hooks(&self) -> AppResult<Vec<HookOccurrence>>;

    /// Occurrences already due at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error when the site's hook data cannot be read.
    fn waiting_hooks(&self, now: DateTime<Utc>) -> AppResult<Vec<HookOccurrence>> {
        let mut hooks = self.pending_hooks()?;
        hooks.retain(|hook| hook.is_waiting(now));
        Ok(hooks)
    }
}

/// Enumerates the sites to scan on each cycle.
pub trait SiteSource: Send + Sync {
    /// Current set of managed sites.
    ///
    /// # Errors
    ///
    /// Returns an error when the site inventory cannot be read.
    fn sites(&self) -> AppResult<Vec<Arc<dyn Site>>>;
}
