//! Property-based tests (proptest): closure determinism, retraction
//! undoing assertion, planner soundness against a naive reference
//! evaluator, and head groundness.

use factlog::{
    compile_rules, Attribute, AttributeSchema, Cardinality, Clause, Fact,
    FactStore, KnowledgeBase, Lookup, MemoryStore, Pattern, Predicate, Rule,
    RuleDecl, Solution, TriplePattern,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

const ENTITIES: [&str; 4] = ["ada", "bo", "cy", "dee"];
const VARS: [&str; 3] = ["x", "y", "z"];

fn attributes() -> AttributeSchema {
    AttributeSchema::new([
        Attribute::string("child_of", Cardinality::Many),
        Attribute::string("likes", Cardinality::Many),
        Attribute::string("descendant_of", Cardinality::Many),
    ])
}

fn descendants_rules() -> Vec<Rule> {
    compile_rules(
        &attributes(),
        &[
            RuleDecl::new(
                "descendant_of_direct_parent",
                [(
                    Pattern::Var("child".to_string()),
                    "child_of",
                    Pattern::Var("parent".to_string()),
                )],
                [(
                    Pattern::Var("child".to_string()),
                    "descendant_of",
                    Pattern::Var("parent".to_string()),
                )],
            ),
            RuleDecl::new(
                "descendant_of_recursive",
                [
                    (
                        Pattern::Var("grandchild".to_string()),
                        "descendant_of",
                        Pattern::Var("parent".to_string()),
                    ),
                    (
                        Pattern::Var("parent".to_string()),
                        "descendant_of",
                        Pattern::Var("grandparent".to_string()),
                    ),
                ],
                [(
                    Pattern::Var("grandchild".to_string()),
                    "descendant_of",
                    Pattern::Var("grandparent".to_string()),
                )],
            ),
        ],
    )
    .expect("rules compile")
}

/// Acyclic child_of edges: parents always have a higher entity index.
fn edge_strategy() -> impl Strategy<Value = Fact> {
    (0usize..ENTITIES.len() - 1)
        .prop_flat_map(|child| {
            ((child + 1)..ENTITIES.len()).prop_map(move |parent| {
                Fact::new(ENTITIES[child], "child_of", ENTITIES[parent])
            })
        })
}

fn edges_strategy() -> impl Strategy<Value = Vec<Fact>> {
    prop::collection::vec(edge_strategy(), 0..8)
}

fn fact_strategy() -> impl Strategy<Value = Fact> {
    (
        prop::sample::select(ENTITIES.to_vec()),
        prop_oneof![Just("child_of"), Just("likes")],
        prop::sample::select(ENTITIES.to_vec()),
    )
        .prop_map(|(entity, attr, value)| Fact::new(entity, attr, value))
}

fn pattern_strategy() -> impl Strategy<Value = Pattern> {
    prop_oneof![
        prop::sample::select(ENTITIES.to_vec()).prop_map(|e| Pattern::Is(e.into())),
        prop::sample::select(VARS.to_vec()).prop_map(|v| Pattern::Var(v.to_string())),
        (
            prop::sample::select(VARS.to_vec()),
            prop::collection::btree_set(
                prop::sample::select(ENTITIES.to_vec()).prop_map(Into::into),
                1..3,
            ),
        )
            .prop_map(|(name, values)| Pattern::In(name.to_string(), values)),
        Just(Pattern::Any),
    ]
}

fn query_strategy() -> impl Strategy<Value = Vec<TriplePattern>> {
    prop::collection::vec(
        (
            pattern_strategy(),
            prop_oneof![Just("child_of"), Just("likes")],
            pattern_strategy(),
        )
            .prop_map(|(entity, attr, value)| TriplePattern::new(entity, attr, value)),
        1..4,
    )
}

fn store_with(facts: &[Fact]) -> MemoryStore {
    let mut store = MemoryStore::new();
    let tx = store.begin().expect("begin").id;
    let pairs: Vec<(Fact, bool)> =
        facts.iter().map(|fact| (fact.clone(), false)).collect();
    store.append(&pairs, tx).expect("append");
    store.commit(tx).expect("commit");
    store
}

/// Exhaustive nested-loop evaluation in declaration order, with no
/// planning and no substitution. The planned evaluator must agree.
fn naive_solve(store: &MemoryStore, predicate: &Predicate) -> BTreeSet<Solution> {
    let mut solutions = vec![Solution::identity()];
    for clause in predicate.clauses() {
        let candidates = store.lookup(clause).expect("lookup");
        let mut merged = Vec::new();
        for fact in &candidates {
            for micro in clause.matches(fact) {
                for solution in &solutions {
                    if let Some(joined) = solution.join(clause, fact, &micro) {
                        merged.push(joined);
                    }
                }
            }
        }
        solutions = merged;
    }
    solutions.into_iter().collect()
}

fn closure_of(kb: &KnowledgeBase<MemoryStore>) -> BTreeSet<Fact> {
    kb.store()
        .valid_facts()
        .expect("facts")
        .into_iter()
        .collect()
}

proptest! {
    #[test]
    fn planned_evaluation_agrees_with_the_naive_evaluator(
        facts in prop::collection::vec(fact_strategy(), 0..12),
        query in query_strategy(),
    ) {
        let store = store_with(&facts);
        let predicate = Predicate::from_patterns(&attributes(), query)
            .expect("single-variable sides are always well-typed here");
        let planned = factlog::query::planner::plan(&predicate, &[])
            .expect("single-variable sides are always schedulable");
        let fast: BTreeSet<Solution> =
            factlog::query::solve::solve(&store, &planned, vec![Solution::identity()])
                .expect("solve")
                .into_iter()
                .collect();
        let reference = naive_solve(&store, &predicate);
        prop_assert_eq!(fast, reference);
    }

    #[test]
    fn the_closure_is_independent_of_insertion_order(
        edges in edges_strategy(),
        seed in any::<u64>(),
    ) {
        let mut bulk = KnowledgeBase::in_memory(attributes(), descendants_rules());
        bulk.bulk_add(edges.clone()).expect("bulk add");

        // insert the same edges one at a time in a shuffled order
        let mut shuffled = edges;
        let mut state = seed;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            shuffled.swap(i, j);
        }
        let mut one_by_one = KnowledgeBase::in_memory(attributes(), descendants_rules());
        for edge in shuffled {
            one_by_one.add(edge).expect("add");
        }

        prop_assert_eq!(closure_of(&bulk), closure_of(&one_by_one));
    }

    #[test]
    fn retraction_undoes_assertion(
        edges in edges_strategy(),
    ) {
        let mut kb = KnowledgeBase::in_memory(attributes(), descendants_rules());
        kb.bulk_add(edges.clone()).expect("add");
        kb.bulk_remove(edges).expect("remove");
        prop_assert_eq!(kb.store().valid_count(), 0);
    }

    #[test]
    fn derived_facts_are_ground_and_supported(
        edges in edges_strategy(),
    ) {
        let mut kb = KnowledgeBase::in_memory(attributes(), descendants_rules());
        kb.bulk_add(edges).expect("add");
        for fact in kb.store().valid_facts().expect("facts") {
            // groundness is structural: every stored fact has a
            // concrete entity and a concrete value of the declared type
            let attribute = kb.schema().get(&fact.attr).expect("declared");
            prop_assert_eq!(fact.value.ordinal_type(), attribute.data_type);
            if kb.store().is_inferred(&fact).expect("flag") == Some(true) {
                prop_assert!(
                    kb.store().count_justifications_for(&fact).expect("count") >= 1
                );
            }
        }
    }
}

/// The naive evaluator itself on a fixed example, so a regression in it
/// cannot silently weaken the differential test.
#[test]
fn naive_evaluator_sanity_check() {
    let facts = [
        Fact::new("ada", "child_of", "cy"),
        Fact::new("bo", "child_of", "cy"),
    ];
    let store = store_with(&facts);
    let predicate = Predicate::from_patterns(
        &attributes(),
        [
            (
                Pattern::Var("a".to_string()),
                "child_of",
                Pattern::Var("p".to_string()),
            ),
            (
                Pattern::Var("b".to_string()),
                "child_of",
                Pattern::Var("p".to_string()),
            ),
        ],
    )
    .expect("well-typed");
    let solutions = naive_solve(&store, &predicate);
    // two sibling orientations; the same fact never serves both clauses
    assert_eq!(solutions.len(), 2);
}

/// Clause lookups over an unsubstituted clause must over-approximate
/// the planned pipeline's narrowed lookups.
#[test]
fn unsubstituted_lookup_returns_the_attribute_partition() {
    let facts = [
        Fact::new("ada", "child_of", "cy"),
        Fact::new("ada", "likes", "bo"),
    ];
    let store = store_with(&facts);
    let predicate = Predicate::from_patterns(
        &attributes(),
        [(
            Pattern::Var("a".to_string()),
            "child_of",
            Pattern::Var("p".to_string()),
        )],
    )
    .expect("well-typed");
    let clause: &Clause = &predicate.clauses()[0];
    let found = store.lookup(clause).expect("lookup");
    assert_eq!(found, vec![Fact::new("ada", "child_of", "cy")]);
}
