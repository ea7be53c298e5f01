// Graph resolution errors

use serde::Serialize;
use thiserror::Error;

/// Dependencies that can never be satisfied; `cycle` is one minimal cycle,
/// each entry depending on the next and the last on the first
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("circular dependency detected in {scope}: {}", render(.cycle))]
pub struct CycleError {
    pub scope: String,
    pub cycle: Vec<String>,
}

fn render(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", cycle.join(" -> "), first),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("{node} in {scope} depends on unknown '{dependency}'")]
    UnknownDependency {
        scope: String,
        node: String,
        dependency: String,
    },

    #[error("duplicate name '{name}' in {scope}")]
    DuplicateName { scope: String, name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = CycleError {
            scope: "stages".into(),
            cycle: vec!["A".into(), "B".into()],
        };
        assert_eq!(err.to_string(), "circular dependency detected in stages: A -> B -> A");

        let self_loop = CycleError {
            scope: "jobs of stage 'Build'".into(),
            cycle: vec!["A".into()],
        };
        assert_eq!(
            self_loop.to_string(),
            "circular dependency detected in jobs of stage 'Build': A -> A"
        );
    }
}
