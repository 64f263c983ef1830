//! Routine registry
//!
//! Built once at startup by explicit `register` calls and shared read-only
//! by every session.

use rv_core::RoutineName;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::predicate::{Effect, Predicate};
use crate::step::Step;

/// A named, registered step list
#[derive(Debug)]
pub struct Routine {
    name: RoutineName,
    steps: Vec<Step>,
}

impl Routine {
    pub fn name(&self) -> &RoutineName {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// All routines sessions can call or redirect to
#[derive(Debug, Default)]
pub struct RoutineRegistry {
    routines: HashMap<RoutineName, Arc<Routine>>,
}

impl RoutineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<RoutineName>, steps: Vec<Step>) -> RegistryResult<()> {
        let name = name.into();
        if self.routines.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!(routine = %name, steps = steps.len(), "Registering routine");
        self.routines
            .insert(name.clone(), Arc::new(Routine { name, steps }));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Routine>> {
        self.routines.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routines.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&RoutineName> {
        let mut names: Vec<_> = self.routines.keys().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Check that every call and redirect names a registered routine
    pub fn validate(&self) -> RegistryResult<()> {
        for name in self.names() {
            let routine = &self.routines[name];
            let mut targets = Vec::new();
            collect_targets(&routine.steps, &mut targets);
            if let Some(target) = targets.into_iter().find(|t| !self.contains(t.as_str())) {
                return Err(RegistryError::UnknownTarget {
                    routine: name.clone(),
                    target: target.clone(),
                });
            }
        }
        Ok(())
    }
}

fn collect_targets<'a>(steps: &'a [Step], out: &mut Vec<&'a RoutineName>) {
    for step in steps {
        match step {
            Step::Call(name) | Step::Redirect(name) => out.push(name),
            Step::Subroutine(steps) => collect_targets(steps, out),
            Step::Loop(looped) => {
                if let crate::step::LoopKind::Until(predicate) = &looped.kind {
                    collect_predicate_targets(predicate, out);
                }
                collect_targets(&looped.body, out);
            }
            Step::Condition(condition) => {
                for clause in condition.clauses() {
                    collect_predicate_targets(&clause.predicate, out);
                    collect_targets(&clause.steps, out);
                }
                if let Some(steps) = condition.fallback() {
                    collect_targets(steps, out);
                }
            }
            _ => {}
        }
    }
}

fn collect_predicate_targets<'a>(predicate: &'a Predicate, out: &mut Vec<&'a RoutineName>) {
    match predicate {
        Predicate::And(all) | Predicate::Or(all) => {
            for p in all {
                collect_predicate_targets(p, out);
            }
        }
        Predicate::Not(inner) => collect_predicate_targets(inner, out),
        Predicate::Exec {
            effect: Effect::Step(step),
            ..
        } => collect_targets(std::slice::from_ref(step.as_ref()), out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{exec_error, is_true};
    use crate::step::{call, forever, if_then, redirect, repeat, subroutine, terminate};

    #[test]
    fn test_register_and_get() {
        let mut registry = RoutineRegistry::new();
        registry.register("Main", vec![terminate()]).unwrap();
        registry.register("ClaimHive", vec![]).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("Main").unwrap().steps().len(), 1);
        assert!(registry.get("Missing").is_none());
        let names: Vec<_> = registry.names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["ClaimHive", "Main"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = RoutineRegistry::new();
        registry.register("Main", vec![]).unwrap();
        assert!(matches!(
            registry.register("Main", vec![]),
            Err(RegistryError::Duplicate(_))
        ));
    }

    #[test]
    fn test_validate_finds_nested_targets() {
        let mut registry = RoutineRegistry::new();
        registry
            .register(
                "Main",
                vec![repeat(
                    forever(),
                    vec![subroutine(vec![if_then(is_true(true), vec![call("ClaimHive")])])],
                )],
            )
            .unwrap();
        registry.register("ClaimHive", vec![redirect("Main")]).unwrap();
        registry.validate().unwrap();

        registry
            .register(
                "Broken",
                vec![if_then(exec_error(redirect("Nowhere")), vec![])],
            )
            .unwrap();
        match registry.validate() {
            Err(RegistryError::UnknownTarget { routine, target }) => {
                assert_eq!(routine.as_str(), "Broken");
                assert_eq!(target.as_str(), "Nowhere");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
