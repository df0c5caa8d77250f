//! Lookup from analyzer codes to remediation strategies.

use crate::domain::models::FixerStrategy;

/// Fixed set of strategies, resolved once at startup.
#[derive(Debug, Clone)]
pub struct FixerRegistry {
    strategies: Vec<FixerStrategy>,
}

impl FixerRegistry {
    /// Registry holding every built-in strategy.
    pub fn builtin() -> Self {
        Self::with_strategies(FixerStrategy::ALL.to_vec())
    }

    pub fn with_strategies(strategies: Vec<FixerStrategy>) -> Self {
        Self { strategies }
    }

    /// Whether any registered strategy handles `code`.
    pub fn can_handle(&self, code: &str) -> bool {
        self.strategies.iter().any(|s| s.can_handle(code))
    }

    /// Every registered strategy matching `code`, in registration order.
    pub fn strategies_for<'a>(&'a self, code: &'a str) -> impl Iterator<Item = FixerStrategy> + 'a {
        self.strategies
            .iter()
            .copied()
            .filter(move |s| s.can_handle(code))
    }

    /// Codes of the registered strategies, in registration order.
    pub fn codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.strategies.iter().map(|s| s.code())
    }
}

impl Default for FixerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_all_codes() {
        let registry = FixerRegistry::builtin();
        for code in ["AZC0012", "azc0030", "AZC0031", "AZC0032", "AZC0033", "AZC0034"] {
            assert!(registry.can_handle(code), "{code}");
        }
        assert!(!registry.can_handle("AZC9999"));
        assert!(!registry.can_handle("AZC001"));
    }

    #[test]
    fn strategies_for_unknown_code_is_empty() {
        let registry = FixerRegistry::builtin();
        assert_eq!(registry.strategies_for("AZC0099").count(), 0);
        assert_eq!(
            registry.strategies_for("AZC0012").collect::<Vec<_>>(),
            vec![FixerStrategy::Azc0012]
        );
    }

    #[test]
    fn custom_registry_returns_every_match() {
        let registry =
            FixerRegistry::with_strategies(vec![FixerStrategy::Azc0030, FixerStrategy::Azc0030]);
        assert_eq!(registry.strategies_for("AZC0030").count(), 2);
        assert!(!registry.can_handle("AZC0012"));
    }

    #[test]
    fn codes_follow_registration_order() {
        let registry =
            FixerRegistry::with_strategies(vec![FixerStrategy::Azc0034, FixerStrategy::Azc0012]);
        assert_eq!(registry.codes().collect::<Vec<_>>(), vec!["AZC0034", "AZC0012"]);
        assert_eq!(FixerRegistry::builtin().codes().count(), FixerStrategy::ALL.len());
    }
}
