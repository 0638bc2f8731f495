//! Property-based tests for symbol equivalence.
//!
//! Generates solutions where several projects reference the same metadata
//! assembly, so every metadata member exists once per compilation, and
//! checks that equivalence, hashing and set unification agree.
#![cfg(feature = "proptest")]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use proptest::prelude::*;

use refscope::base::SymbolId;
use refscope::find_symbols::{MetadataUnifyingSymbolSet, SymbolIdentity, symbols_equivalent};
use refscope::hir::{Solution, SolutionBuilder, SymbolKind, TypeKind};

// ============================================================================
// PROPTEST STRATEGIES
// ============================================================================

fn member_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[A-Z][a-z]{1,6}", 1..6)
        .prop_map(|names| names.into_iter().collect())
}

/// A solution with `projects` compilations that all see `Lib.Api` and its members.
fn solution_with(projects: usize, members: &[String]) -> (Solution, Vec<SymbolId>) {
    let mut b = SolutionBuilder::new();
    let api = b.declare_metadata_type("Lib", "Lib.Api", TypeKind::Class).id();
    for name in members {
        b.declare_metadata_member(api, name, SymbolKind::Method).signature("()");
    }
    let ids: Vec<_> = (0..projects).map(|n| b.add_project(&format!("P{n}"))).collect();
    for &p in &ids {
        b.add_metadata_reference(p, "Lib");
    }
    let solution = b.build().unwrap();

    let instances: Vec<SymbolId> = ids
        .iter()
        .flat_map(|&p| {
            members
                .iter()
                .map(move |name| format!("M:Lib.Api.{name}()"))
                .filter_map(|key| solution.resolve_key(p, &key))
                .collect::<Vec<_>>()
        })
        .collect();
    (solution, instances)
}

fn hash_of(identity: &SymbolIdentity) -> u64 {
    let mut hasher = DefaultHasher::new();
    identity.hash(&mut hasher);
    hasher.finish()
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn equivalence_is_reflexive_and_hash_consistent(
        projects in 1usize..5,
        members in member_names(),
    ) {
        let (solution, instances) = solution_with(projects, &members);
        prop_assert_eq!(instances.len(), projects * members.len());

        for &a in &instances {
            prop_assert!(symbols_equivalent(&solution, a, a));
            for &b in &instances {
                let same_key = solution.symbol(a).key == solution.symbol(b).key;
                prop_assert_eq!(symbols_equivalent(&solution, a, b), same_key);
                prop_assert_eq!(
                    symbols_equivalent(&solution, a, b),
                    symbols_equivalent(&solution, b, a)
                );
                if symbols_equivalent(&solution, a, b) {
                    prop_assert_eq!(
                        hash_of(&SymbolIdentity::of(&solution, a)),
                        hash_of(&SymbolIdentity::of(&solution, b))
                    );
                }
            }
        }
    }

    #[test]
    fn unifying_set_keeps_first_instance_per_member(
        projects in 1usize..5,
        members in member_names(),
    ) {
        let (solution, instances) = solution_with(projects, &members);

        let mut set = MetadataUnifyingSymbolSet::new();
        set.extend(&solution, instances.iter().copied());
        prop_assert_eq!(set.len(), members.len());
        // Instances of the first project come first and win.
        prop_assert_eq!(set.to_vec(), instances[..members.len()].to_vec());
        for &s in &instances {
            prop_assert!(set.contains(&solution, s));
        }
    }
}
