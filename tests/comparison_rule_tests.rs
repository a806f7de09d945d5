//! Rules with comparison guards: weather classification and relative
//! temperature ordering.

use factlog::{
    compile_rules, is, one_of, var, Attribute, AttributeSchema, Cardinality,
    Context, Fact, KnowledgeBase, MemoryStore, Ordinal, Rule, RuleDecl,
};
use std::collections::BTreeSet;

fn attributes() -> AttributeSchema {
    AttributeSchema::new([
        Attribute::int("precipitation_percent", Cardinality::One),
        Attribute::int("precipitation_mm", Cardinality::One),
        Attribute::int("temperature_c", Cardinality::One),
        Attribute::string("weather_condition", Cardinality::One),
        Attribute::string("is_warmer_than", Cardinality::Many),
        Attribute::string("is_colder_than", Cardinality::Many),
    ])
}

fn weather_rules() -> Vec<Rule> {
    let will_precipitate = (
        var("place"),
        "precipitation_percent",
        var("precipitation").ge(50i64),
    );
    let light = (var("place"), "precipitation_mm", var("mm").le(5i64));
    let heavy = (var("place"), "precipitation_mm", var("mm").gt(5i64));
    let cold = (var("place"), "temperature_c", var("temp").le(0i64));
    let warm = (var("place"), "temperature_c", var("temp").gt(0i64));

    compile_rules(
        &attributes(),
        &[
            RuleDecl::new(
                "light_snow",
                [will_precipitate.clone(), light.clone(), cold.clone()],
                [(var("place"), "weather_condition", is("light snow"))],
            ),
            RuleDecl::new(
                "heavy_snow",
                [will_precipitate.clone(), heavy.clone(), cold],
                [(var("place"), "weather_condition", is("heavy snow"))],
            ),
            RuleDecl::new(
                "light_rain",
                [will_precipitate.clone(), light, warm.clone()],
                [(var("place"), "weather_condition", is("light rain"))],
            ),
            RuleDecl::new(
                "heavy_rain",
                [will_precipitate, heavy, warm],
                [(var("place"), "weather_condition", is("heavy rain"))],
            ),
        ],
    )
    .expect("rules compile")
}

fn temperature_relation_rules() -> Vec<Rule> {
    compile_rules(
        &attributes(),
        &[RuleDecl::new(
            "temperature_relation",
            [
                (var("warm_place"), "temperature_c", var("warm")),
                (
                    var("cold_place"),
                    "temperature_c",
                    var("cold").lt_var("warm"),
                ),
            ],
            [
                (var("warm_place"), "is_warmer_than", var("cold_place")),
                (var("cold_place"), "is_colder_than", var("warm_place")),
            ],
        )],
    )
    .expect("rules compile")
}

fn places_facts() -> Vec<Fact> {
    [
        // light snow
        ("winterfell", "precipitation_percent", 60i64),
        ("winterfell", "precipitation_mm", 1),
        ("winterfell", "temperature_c", -2),
        // heavy rain
        ("tropic", "precipitation_percent", 50),
        ("tropic", "precipitation_mm", 10),
        ("tropic", "temperature_c", 34),
        // nothing
        ("nothing1", "precipitation_mm", 60),
        ("nothing2", "precipitation_mm", 10),
        ("nothing3", "precipitation_percent", 10),
        ("nothing3", "precipitation_mm", 10),
        // mild temperature, no precipitation data
        ("mild_temp", "temperature_c", 10),
    ]
    .into_iter()
    .map(Fact::from)
    .collect()
}

fn loaded(rules: Vec<Rule>) -> KnowledgeBase<MemoryStore> {
    let mut kb = KnowledgeBase::in_memory(attributes(), rules);
    kb.bulk_add(places_facts()).expect("places load");
    kb
}

fn string_pairs(
    contexts: &BTreeSet<Context>,
    first: &str,
    second: &str,
) -> BTreeSet<(String, String)> {
    contexts
        .iter()
        .map(|ctx| {
            let get = |name: &str| match ctx.get(name) {
                Some(Ordinal::String(s)) => s.clone(),
                other => panic!("expected string binding for {name}, got {other:?}"),
            };
            (get(first), get(second))
        })
        .collect()
}

#[test]
fn weather_condition_is_inferred_from_guarded_rules() {
    let kb = loaded(weather_rules());
    let found = kb
        .solve([
            ("winterfell", "weather_condition", var("winterfell")),
            ("tropic", "weather_condition", var("tropic")),
        ])
        .expect("solve");
    assert_eq!(found.len(), 1);
    let ctx = found.iter().next().expect("one solution");
    assert_eq!(ctx.get("winterfell"), Some(&Ordinal::from("light snow")));
    assert_eq!(ctx.get("tropic"), Some(&Ordinal::from("heavy rain")));

    // the dry and dataless places stay unclassified
    let all = kb
        .solve([(var("place"), "weather_condition", var("condition"))])
        .expect("solve");
    assert_eq!(all.len(), 2);
}

#[test]
fn membership_queries_narrow_the_entity_side() {
    let kb = loaded(weather_rules());
    let found = kb
        .solve([(
            one_of("place", ["winterfell", "tropic"]),
            "weather_condition",
            var("condition"),
        )])
        .expect("solve");
    assert_eq!(
        string_pairs(&found, "place", "condition"),
        [
            ("winterfell".to_string(), "light snow".to_string()),
            ("tropic".to_string(), "heavy rain".to_string()),
        ]
        .into_iter()
        .collect()
    );
}

#[test]
fn snow_inference_retracts_when_the_temperature_rises() {
    let mut kb = KnowledgeBase::in_memory(
        attributes(),
        compile_rules(
            &attributes(),
            &[RuleDecl::new(
                "snow",
                [
                    (
                        var("place"),
                        "precipitation_percent",
                        var("x").ge(50i64),
                    ),
                    (var("place"), "temperature_c", var("t").le(0i64)),
                ],
                [(var("place"), "weather_condition", is("snow"))],
            )],
        )
        .expect("rule compiles"),
    );
    kb.bulk_add([
        ("winterfell", "precipitation_percent", 60i64),
        ("winterfell", "temperature_c", -2),
    ])
    .expect("add");

    let found = kb
        .solve([("winterfell", "weather_condition", var("w"))])
        .expect("solve");
    assert_eq!(found.len(), 1);
    assert_eq!(
        found.iter().next().expect("one").get("w"),
        Some(&Ordinal::from("snow"))
    );

    // warming up supersedes the temperature and retracts the inference
    kb.add(("winterfell", "temperature_c", 5i64)).expect("add");
    let found = kb
        .solve([("winterfell", "weather_condition", var("w"))])
        .expect("solve");
    assert!(found.is_empty());
}

#[test]
fn variable_to_variable_comparisons_order_the_places() {
    let kb = loaded(temperature_relation_rules());
    let found = kb
        .solve([(var("cold_place"), "is_colder_than", var("warm_place"))])
        .expect("solve");
    assert_eq!(
        string_pairs(&found, "cold_place", "warm_place"),
        [
            ("winterfell".to_string(), "mild_temp".to_string()),
            ("winterfell".to_string(), "tropic".to_string()),
            ("mild_temp".to_string(), "tropic".to_string()),
        ]
        .into_iter()
        .collect()
    );
}

#[test]
fn comparison_joins_work_in_queries_too() {
    let kb = loaded(temperature_relation_rules());
    let found = kb
        .solve([
            (var("warm_place"), "temperature_c", var("warm")),
            (
                var("cold_place"),
                "temperature_c",
                var("warm").gt_var("cold"),
            ),
        ])
        .expect("solve");

    let expected: BTreeSet<(String, i64, String, i64)> = [
        ("tropic".to_string(), 34, "mild_temp".to_string(), 10),
        ("tropic".to_string(), 34, "winterfell".to_string(), -2),
        ("mild_temp".to_string(), 10, "winterfell".to_string(), -2),
    ]
    .into_iter()
    .collect();
    let got: BTreeSet<(String, i64, String, i64)> = found
        .iter()
        .map(|ctx| {
            let name = |key: &str| match ctx.get(key) {
                Some(Ordinal::String(s)) => s.clone(),
                other => panic!("expected string for {key}, got {other:?}"),
            };
            let int = |key: &str| match ctx.get(key) {
                Some(Ordinal::Int(i)) => *i,
                other => panic!("expected int for {key}, got {other:?}"),
            };
            (name("warm_place"), int("warm"), name("cold_place"), int("cold"))
        })
        .collect();
    assert_eq!(got, expected);
}

#[test]
fn the_closure_is_order_independent_with_guards() {
    let forward = loaded(temperature_relation_rules());

    let mut reversed =
        KnowledgeBase::in_memory(attributes(), temperature_relation_rules());
    let mut facts = places_facts();
    facts.reverse();
    for fact in facts {
        reversed.add(fact).expect("add");
    }

    let query = [(var("a"), "is_warmer_than", var("b"))];
    assert_eq!(
        forward.solve(query.clone()).expect("solve"),
        reversed.solve(query).expect("solve")
    );
}
