//! Domain rule engine
//!
//! A rule is a pure function from a diagram to findings, registered under a
//! name in a [`RuleRegistry`]. Rules never see each other's results, so the
//! order in which they run does not matter.

mod completeness;
mod logic_level;
mod orphans;
mod power_budget;
mod requirements;
pub mod units;

pub use completeness::implementation_completeness;
pub use logic_level::logic_level_compatibility;
pub use orphans::orphans_and_placeholders;
pub use power_budget::power_budget;
pub use requirements::requirement_checks;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::validation::Finding;
use indexmap::IndexMap;
use std::fmt;
use sysblock_model::{DiagramPath, Graph};

/// Name of the logic-level compatibility rule
pub const LOGIC_LEVEL: &str = "logic_level";
/// Name of the power budget rule
pub const POWER_BUDGET: &str = "power_budget";
/// Name of the implementation completeness rule
pub const COMPLETENESS: &str = "completeness";
/// Name of the orphan/placeholder rule
pub const ORPHANS: &str = "orphans";
/// Name of the requirement evaluation rule
pub const REQUIREMENTS: &str = "requirements";

/// What a rule sees: one diagram plus engine settings
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Diagram under inspection
    pub graph: &'a Graph,
    /// Where the diagram sits in the tree
    pub scope: &'a DiagramPath,
    /// Engine settings
    pub config: &'a EngineConfig,
}

/// A named domain rule
pub type Rule = Box<dyn Fn(&RuleContext<'_>) -> Vec<Finding> + Send + Sync>;

/// Registry of named rules, kept in registration order
#[derive(Default)]
pub struct RuleRegistry {
    rules: IndexMap<String, Rule>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

impl RuleRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create registry with the built-in rules
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(LOGIC_LEVEL, logic_level_compatibility);
        registry.register(POWER_BUDGET, power_budget);
        registry.register(COMPLETENESS, implementation_completeness);
        registry.register(ORPHANS, orphans_and_placeholders);
        registry.register(REQUIREMENTS, requirement_checks);
        registry
    }

    /// Register a rule, replacing any rule of the same name
    pub fn register<F>(&mut self, name: &str, rule: F)
    where
        F: Fn(&RuleContext<'_>) -> Vec<Finding> + Send + Sync + 'static,
    {
        self.rules.insert(name.to_string(), Box::new(rule));
    }

    /// Remove a rule
    #[inline]
    pub fn remove(&mut self, name: &str) -> bool {
        self.rules.shift_remove(name).is_some()
    }

    /// Check if a rule exists
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Registered names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }

    /// Number of registered rules
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run the selected rules and concatenate their findings
    ///
    /// With `names` unset the selection falls back to
    /// `config.enabled_rules`, then to every registered rule. Nested child
    /// diagrams are visited when `config.recurse_into_children` is set.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownRule`] if a selected name is not
    /// registered; no rule runs in that case
    pub fn run(
        &self,
        graph: &Graph,
        names: Option<&[&str]>,
        config: &EngineConfig,
    ) -> EngineResult<Vec<Finding>> {
        let selected: Vec<&str> = match (names, config.enabled_rules.as_ref()) {
            (Some(names), _) => names.to_vec(),
            (None, Some(enabled)) => enabled.iter().map(String::as_str).collect(),
            (None, None) => self.names(),
        };
        let rules = selected
            .iter()
            .map(|name| {
                self.rules
                    .get(*name)
                    .ok_or_else(|| EngineError::UnknownRule((*name).to_string()))
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let diagrams = if config.recurse_into_children {
            graph.walk()
        } else {
            vec![(DiagramPath::root(), graph)]
        };

        let mut findings = Vec::new();
        for (scope, diagram) in &diagrams {
            let ctx = RuleContext {
                graph: diagram,
                scope,
                config,
            };
            for rule in &rules {
                findings.extend(rule(&ctx).into_iter().map(|f| f.in_scope(scope.clone())));
            }
        }
        tracing::debug!(
            rules = selected.len(),
            diagrams = diagrams.len(),
            findings = findings.len(),
            "Rules evaluated"
        );
        Ok(findings)
    }
}

/// Run built-in rules with default settings
///
/// # Errors
/// Returns [`EngineError::UnknownRule`] for an unregistered name
pub fn run_rules(graph: &Graph, names: Option<&[&str]>) -> EngineResult<Vec<Finding>> {
    RuleRegistry::with_defaults().run(graph, names, &EngineConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FindingCode;
    use sysblock_model::{Block, BlockType};

    fn lonely_pair() -> Graph {
        let mut graph = Graph::new();
        graph.blocks.insert("a".into(), Block::new("a", "A", BlockType::Generic));
        graph.blocks.insert("b".into(), Block::new("b", "B", BlockType::Generic));
        graph
    }

    #[test]
    fn registry_with_defaults() {
        let registry = RuleRegistry::with_defaults();
        assert_eq!(registry.len(), 5);
        assert_eq!(
            registry.names(),
            vec![LOGIC_LEVEL, POWER_BUDGET, COMPLETENESS, ORPHANS, REQUIREMENTS]
        );
    }

    #[test]
    fn unknown_rule_is_an_error() {
        let err = run_rules(&lonely_pair(), Some(&["orphans", "bogus"])).unwrap_err();
        assert!(matches!(err, EngineError::UnknownRule(ref n) if n == "bogus"));
    }

    #[test]
    fn selection_limits_rules() {
        let graph = lonely_pair();
        let all = run_rules(&graph, None).unwrap();
        let only = run_rules(&graph, Some(&[COMPLETENESS])).unwrap();
        assert!(!all.is_empty());
        assert!(only.is_empty());
    }

    #[test]
    fn config_selection_applies_without_names() {
        let registry = RuleRegistry::with_defaults();
        let config = EngineConfig::new().with_enabled_rules([COMPLETENESS]);
        assert!(registry.run(&lonely_pair(), None, &config).unwrap().is_empty());
    }

    #[test]
    fn custom_rules_can_be_registered() {
        let mut registry = RuleRegistry::new();
        registry.register("count", |ctx: &RuleContext<'_>| {
            vec![Finding::warning(
                FindingCode::OrphanBlock,
                format!("{} blocks", ctx.graph.blocks.len()),
            )]
        });
        let findings = registry
            .run(&lonely_pair(), None, &EngineConfig::default())
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "2 blocks");
        assert!(registry.remove("count"));
        assert!(registry.is_empty());
    }

    #[test]
    fn rules_are_order_independent() {
        let graph = lonely_pair();
        let forward = run_rules(&graph, Some(&[ORPHANS, COMPLETENESS])).unwrap();
        let backward = run_rules(&graph, Some(&[COMPLETENESS, ORPHANS])).unwrap();
        assert_eq!(forward.len(), backward.len());
        for f in &forward {
            assert!(backward.contains(f));
        }
    }
}
