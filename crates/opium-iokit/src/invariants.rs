//! Runtime-checkable registry invariants
//!
//! # Invariants
//!
//! 1. **Back-reference consistency**: a service lists a client iff that
//!    client names it as provider, and every referenced ID exists
//! 2. **Acyclic provider graph**: following providers always terminates
//! 3. **ID monotonicity**: every assigned ID is below the next ID
//! 4. **Root is a root**: the root service never has a provider

use alloc::string::String;
use alloc::vec::Vec;

use crate::registry::IoRegistry;

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all registry invariants.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_registry_invariants(registry: &IoRegistry) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    violations.extend(check_back_references(registry));
    violations.extend(check_acyclic(registry));
    violations.extend(check_id_monotonicity(registry));
    violations.extend(check_root(registry));

    violations
}

fn check_back_references(registry: &IoRegistry) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (id, node) in registry.nodes() {
        if let Some(provider) = node.provider {
            match registry.clients(provider) {
                Some(clients) if clients.contains(id) => {}
                Some(_) => violations.push(InvariantViolation {
                    invariant: "back_reference_consistency",
                    description: alloc::format!(
                        "Service {} names provider {} which does not list it",
                        id.0,
                        provider.0
                    ),
                }),
                None => violations.push(InvariantViolation {
                    invariant: "back_reference_consistency",
                    description: alloc::format!(
                        "Service {} names non-existent provider {}",
                        id.0,
                        provider.0
                    ),
                }),
            }
        }

        for client in &node.clients {
            if registry.provider(*client) != Some(*id) {
                violations.push(InvariantViolation {
                    invariant: "back_reference_consistency",
                    description: alloc::format!(
                        "Service {} lists client {} which does not name it as provider",
                        id.0,
                        client.0
                    ),
                });
            }
        }
    }

    violations
}

fn check_acyclic(registry: &IoRegistry) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let limit = registry.len();

    for (id, _) in registry.nodes() {
        let mut current = registry.provider(*id);
        let mut steps = 0;
        while let Some(p) = current {
            steps += 1;
            if p == *id || steps > limit {
                violations.push(InvariantViolation {
                    invariant: "acyclic_provider_graph",
                    description: alloc::format!("Service {} is its own ancestor", id.0),
                });
                break;
            }
            current = registry.provider(p);
        }
    }

    violations
}

fn check_id_monotonicity(registry: &IoRegistry) -> Vec<InvariantViolation> {
    let next = registry.next_id();
    registry
        .nodes()
        .filter(|(id, _)| **id >= next)
        .map(|(id, _)| InvariantViolation {
            invariant: "id_monotonicity",
            description: alloc::format!("Service ID {} >= next ID {}", id.0, next.0),
        })
        .collect()
}

fn check_root(registry: &IoRegistry) -> Vec<InvariantViolation> {
    let root = registry.root();
    match registry.provider(root) {
        Some(p) => alloc::vec![InvariantViolation {
            invariant: "root_is_root",
            description: alloc::format!("Root service {} has provider {}", root.0, p.0),
        }],
        None => Vec::new(),
    }
}
