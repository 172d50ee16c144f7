//! Newsletter registry capability.
//!
//! The set of publishable newsletters lives outside this core (admin-managed
//! in the application database). The mapper and orchestrator consult it
//! through this trait.

use std::collections::BTreeSet;

/// Live view of the newsletter catalogue.
pub trait NewsletterRegistry: Send + Sync {
    /// Slugs that may appear in subscription requests. Unknown slugs are
    /// dropped, not errors.
    fn valid_slugs(&self) -> BTreeSet<String>;

    /// Whether subscribing to this slug requires a confirmation step before
    /// the subscription becomes active.
    fn requires_double_opt_in(&self, slug: &str) -> bool;

    /// Language codes the catalogue publishes in (e.g. `en`, `zh-TW`).
    fn languages(&self) -> Vec<String>;
}

/// Fixed registry for tests and static deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    slugs: BTreeSet<String>,
    exempt_from_confirmation: BTreeSet<String>,
    languages: Vec<String>,
}

impl StaticRegistry {
    pub fn new(slugs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            slugs: slugs.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Mark slugs as not requiring double opt-in.
    #[must_use]
    pub fn with_confirmation_exempt(
        mut self,
        slugs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.exempt_from_confirmation = slugs.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_languages(mut self, langs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.languages = langs.into_iter().map(Into::into).collect();
        self
    }
}

impl NewsletterRegistry for StaticRegistry {
    fn valid_slugs(&self) -> BTreeSet<String> {
        self.slugs.clone()
    }

    fn requires_double_opt_in(&self, slug: &str) -> bool {
        !self.exempt_from_confirmation.contains(slug)
    }

    fn languages(&self) -> Vec<String> {
        self.languages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_registry() {
        let registry = StaticRegistry::new(["app-weekly", "beta"])
            .with_confirmation_exempt(["beta"])
            .with_languages(["en", "fr"]);
        assert!(registry.valid_slugs().contains("app-weekly"));
        assert!(!registry.valid_slugs().contains("unknown"));
        assert!(registry.requires_double_opt_in("app-weekly"));
        assert!(!registry.requires_double_opt_in("beta"));
        assert_eq!(registry.languages(), vec!["en", "fr"]);
    }
}
