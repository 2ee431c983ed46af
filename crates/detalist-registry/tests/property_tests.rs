//! Registry invariants over random workloads

use detalist_registry::prelude::*;
use detalist_registry::ErrorKind;
use detalist_test_utils::*;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

/// One step of a workload; indices are taken modulo the current item count
#[derive(Debug, Clone)]
enum Step {
    Leaf,
    Assembly(Vec<usize>),
    Duplicate(usize),
    Break(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Leaf),
        3 => prop::collection::vec(any::<usize>(), 1..4).prop_map(Step::Assembly),
        1 => any::<usize>().prop_map(Step::Duplicate),
        1 => any::<usize>().prop_map(Step::Break),
    ]
}

/// Applies `steps`, returning the ids of successful creates in call order
fn run(registry: &TestRegistry, steps: &[Step]) -> Vec<ItemId> {
    let mut created = Vec::new();
    let mut codes: Vec<String> = Vec::new();
    for (n, step) in steps.iter().enumerate() {
        let count = created.len();
        let result = match step {
            Step::Leaf => registry.create(leaf_draft(&format!("L{n}"))),
            Step::Assembly(picks) if count > 0 => {
                let parts: Vec<u64> = picks.iter().map(|p| (p % count) as u64).collect();
                registry.create(assembly_draft(&format!("S{n}"), &parts))
            }
            Step::Duplicate(pick) if count > 0 => registry.create(leaf_draft(&codes[pick % count])),
            Step::Break(pick) if count > 0 => {
                let _ = registry.mark_broken(ItemId((pick % count) as u64));
                continue;
            }
            _ => continue,
        };
        if let Ok(id) = result {
            created.push(id);
            codes.push(registry.get_item(id).unwrap().code.clone());
        }
    }
    created
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_ids_are_contiguous(steps in prop::collection::vec(step(), 0..40)) {
        let registry = memory_registry();
        let created = run(&registry, &steps);
        let expected: Vec<ItemId> = (0..created.len() as u64).map(ItemId).collect();
        prop_assert_eq!(created, expected);
    }

    #[test]
    fn prop_free_items_are_exactly_unconsumed(steps in prop::collection::vec(step(), 0..40)) {
        let registry = memory_registry();
        let created = run(&registry, &steps);

        let mut consumed = HashSet::new();
        let mut codes = BTreeSet::new();
        for &id in &created {
            let item = registry.get_item(id).unwrap();
            prop_assert!(codes.insert(item.code.clone()));
            prop_assert_eq!(registry.get_item_by_code(&item.code).unwrap().id, id);
            for part in &item.parts {
                prop_assert!(part.id < id);
                prop_assert!(consumed.insert(part.id));
            }
        }

        let expected: Vec<u64> = created
            .iter()
            .filter(|id| !consumed.contains(*id))
            .map(|id| id.get())
            .collect();
        prop_assert_eq!(free_ids(&registry), expected);
        assert_audit_clean(&registry);
    }

    #[test]
    fn prop_break_is_one_way(steps in prop::collection::vec(step(), 1..30), pick in any::<usize>()) {
        let registry = memory_registry();
        let created = run(&registry, &steps);
        prop_assume!(!created.is_empty());

        let id = created[pick % created.len()];
        let was_broken = registry.get_item(id).unwrap().broken;
        let first = registry.mark_broken(id);
        prop_assert_eq!(first.is_ok(), !was_broken);

        let second = registry.mark_broken(id).unwrap_err();
        prop_assert_eq!(second.kind(), ErrorKind::AlreadyBroken);
        prop_assert!(registry.get_item(id).unwrap().broken);
    }
}
