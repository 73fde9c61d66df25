// SPDX-License-Identifier: MIT

//! Routers: pure functions from State to the next node
//!
//! A Router must not touch collaborators or mutate state. Every Router
//! declares the targets it can return so compile can check them.

use serde_json::Value;
use std::fmt;

use crate::adk::error::StepError;
use crate::workflow::condition::{self, Expression, Literal, ParseError};
use crate::workflow::state::State;

/// Reserved name of the terminal marker
pub const END: &str = "__end__";

/// Reserved name of the virtual entry node
pub const START: &str = "__start__";

/// Where control goes after a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Node(String),
    End,
}

impl Target {
    pub fn node(&self) -> Option<&str> {
        match self {
            Target::Node(name) => Some(name),
            Target::End => None,
        }
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        if name == END {
            Target::End
        } else {
            Target::Node(name.to_string())
        }
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        if name == END {
            Target::End
        } else {
            Target::Node(name)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Node(name) => f.write_str(name),
            Target::End => f.write_str(END),
        }
    }
}

pub trait Router: Send + Sync {
    /// Pick the next node; `Err(InvalidState)` if the fields it needs are unusable
    fn route(&self, state: &State) -> Result<Target, StepError>;

    /// Every target `route` may return
    fn targets(&self) -> Vec<Target>;

    /// Top-level State fields this Router inspects
    fn reads(&self) -> Vec<String> {
        Vec::new()
    }
}

struct Rule {
    source: String,
    expr: Expression,
    target: Target,
}

/// Ordered `when` rules; the first match wins.
///
/// ```
/// use stepgraph::workflow::router::RuleRouter;
///
/// let router = RuleRouter::new()
///     .when("adaptation_needed", "adapt")
///     .unwrap()
///     .otherwise("execute");
/// ```
#[derive(Default)]
pub struct RuleRouter {
    rules: Vec<Rule>,
    default: Option<Target>,
}

impl RuleRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; the condition uses the `when` expression syntax
    pub fn when(mut self, condition: &str, target: impl Into<Target>) -> Result<Self, ParseError> {
        let expr = condition::parse(condition)?;
        self.rules.push(Rule {
            source: condition.to_string(),
            expr,
            target: target.into(),
        });
        Ok(self)
    }

    /// Target used when no rule matches
    pub fn otherwise(mut self, target: impl Into<Target>) -> Self {
        self.default = Some(target.into());
        self
    }

    /// `(condition, target)` pairs in evaluation order
    pub fn rules(&self) -> impl Iterator<Item = (&str, &Target)> {
        self.rules.iter().map(|r| (r.source.as_str(), &r.target))
    }

    pub fn default_target(&self) -> Option<&Target> {
        self.default.as_ref()
    }
}

impl Router for RuleRouter {
    fn route(&self, state: &State) -> Result<Target, StepError> {
        for rule in &self.rules {
            if let Some(field) = missing_field(&rule.expr, state) {
                return Err(StepError::invalid_state(format!(
                    "routing rule '{}' reads missing field '{}'",
                    rule.source, field
                )));
            }
            if condition::evaluate(&rule.expr, state) {
                log::debug!("Rule '{}' matched, routing to {}", rule.source, rule.target);
                return Ok(rule.target.clone());
            }
        }
        self.default
            .clone()
            .ok_or_else(|| StepError::invalid_state("no routing rule matched and no default set"))
    }

    fn targets(&self) -> Vec<Target> {
        let mut targets: Vec<Target> = Vec::new();
        for target in self.rules.iter().map(|r| &r.target).chain(self.default.as_ref()) {
            if !targets.contains(target) {
                targets.push(target.clone());
            }
        }
        targets
    }

    fn reads(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .rules
            .iter()
            .flat_map(|r| r.expr.paths())
            .map(|p| p.split('.').next().unwrap_or(p).to_string())
            .collect();
        fields.sort();
        fields.dedup();
        fields
    }
}

/// First top-level field the expression reads that is absent or null.
/// Comparing a path against `null` opts that path out.
fn missing_field<'a>(expr: &'a Expression, state: &State) -> Option<&'a str> {
    match expr {
        Expression::Compare {
            right: Literal::Null,
            ..
        } => None,
        Expression::Compare { path, .. } | Expression::Truthy(path) => {
            let root = path.split('.').next().unwrap_or(path);
            match state.get(root) {
                None | Some(Value::Null) => Some(root),
                Some(_) => None,
            }
        }
        Expression::And(l, r) | Expression::Or(l, r) => {
            missing_field(l, state).or_else(|| missing_field(r, state))
        }
        Expression::Not(inner) => missing_field(inner, state),
        Expression::True | Expression::False => None,
    }
}

type RouteFn = Box<dyn Fn(&State) -> Result<Target, StepError> + Send + Sync>;

/// A Router backed by a closure
pub struct FnRouter {
    targets: Vec<Target>,
    reads: Vec<String>,
    func: RouteFn,
}

impl FnRouter {
    pub fn new<I, T>(
        targets: I,
        func: impl Fn(&State) -> Result<Target, StepError> + Send + Sync + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            reads: Vec::new(),
            func: Box::new(func),
        }
    }

    pub fn reading<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reads = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl Router for FnRouter {
    fn route(&self, state: &State) -> Result<Target, StepError> {
        (self.func)(state)
    }

    fn targets(&self) -> Vec<Target> {
        self.targets.clone()
    }

    fn reads(&self) -> Vec<String> {
        self.reads.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapt_router() -> RuleRouter {
        RuleRouter::new()
            .when("adaptation_needed == true", "adapt")
            .unwrap()
            .otherwise("execute")
    }

    #[test]
    fn test_target_from_str() {
        assert_eq!(Target::from(END), Target::End);
        assert_eq!(Target::from("plan"), Target::Node("plan".into()));
        assert_eq!(Target::End.to_string(), END);
        assert_eq!(Target::from("plan").node(), Some("plan"));
    }

    #[test]
    fn test_rule_router_first_match() {
        let router = adapt_router();
        let state = State::new().with("adaptation_needed", true);
        assert_eq!(router.route(&state).unwrap(), Target::from("adapt"));

        let state = State::new().with("adaptation_needed", false);
        assert_eq!(router.route(&state).unwrap(), Target::from("execute"));
    }

    #[test]
    fn test_rule_router_order_matters() {
        let router = RuleRouter::new()
            .when("score < 5", "adapt")
            .unwrap()
            .when("score < 8", "review")
            .unwrap()
            .otherwise(END);

        assert_eq!(
            router.route(&State::new().with("score", 3)).unwrap(),
            Target::from("adapt")
        );
        assert_eq!(
            router.route(&State::new().with("score", 6)).unwrap(),
            Target::from("review")
        );
        assert_eq!(router.route(&State::new().with("score", 9)).unwrap(), Target::End);
    }

    #[test]
    fn test_rule_router_without_default() {
        let router = RuleRouter::new().when("done", END).unwrap();
        let err = router.route(&State::new()).unwrap_err();
        assert!(matches!(err, StepError::InvalidState(_)));
    }

    #[test]
    fn test_rule_router_missing_field_is_invalid_state() {
        let router = adapt_router();
        let err = router.route(&State::new()).unwrap_err();
        assert!(matches!(err, StepError::InvalidState(ref m) if m.contains("adaptation_needed")));

        let state = State::new().with("adaptation_needed", Value::Null);
        assert!(matches!(
            router.route(&state),
            Err(StepError::InvalidState(_))
        ));

        // a misspelled field never silently falls through to the default
        let typo = RuleRouter::new()
            .when("adaptation_neded == true", "adapt")
            .unwrap()
            .otherwise("execute");
        let state = State::new().with("adaptation_needed", true);
        assert!(typo.route(&state).is_err());
    }

    #[test]
    fn test_rule_router_null_comparison_opts_in() {
        let router = RuleRouter::new()
            .when("feedback == null", "ask")
            .unwrap()
            .otherwise("revise");
        assert_eq!(router.route(&State::new()).unwrap(), Target::from("ask"));
        assert_eq!(
            router
                .route(&State::new().with("feedback", "more detail"))
                .unwrap(),
            Target::from("revise")
        );
    }

    #[test]
    fn test_rule_router_stops_at_first_match() {
        // later rules are not checked once one matches
        let router = RuleRouter::new()
            .when("done", END)
            .unwrap()
            .when("retries < 3", "again")
            .unwrap();
        assert_eq!(
            router.route(&State::new().with("done", true)).unwrap(),
            Target::End
        );
    }

    #[test]
    fn test_rule_router_rejects_bad_condition() {
        assert!(RuleRouter::new().when("score >", "adapt").is_err());
    }

    #[test]
    fn test_rule_router_declarations() {
        let router = RuleRouter::new()
            .when("evaluation.score < 5 and retries < 3", "adapt")
            .unwrap()
            .otherwise("execute");

        assert_eq!(
            router.targets(),
            vec![Target::from("adapt"), Target::from("execute")]
        );
        assert_eq!(router.reads(), vec!["evaluation", "retries"]);
        assert_eq!(router.rules().count(), 1);
        assert_eq!(router.default_target(), Some(&Target::from("execute")));
    }

    #[test]
    fn test_fn_router() {
        let router = FnRouter::new(["left", "right"], |state| {
            Ok(if state.require_bool("go_left")? {
                Target::from("left")
            } else {
                Target::from("right")
            })
        })
        .reading(["go_left"]);

        assert_eq!(
            router.route(&State::new().with("go_left", true)).unwrap(),
            Target::from("left")
        );
        assert!(router.route(&State::new()).is_err());
        assert_eq!(router.targets().len(), 2);
        assert_eq!(router.reads(), vec!["go_left"]);
    }
}
