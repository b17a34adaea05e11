// Optimizer Equivalence Tests
// Every query where a fast path may fire must produce exactly the result of
// naive evaluation on the same snapshot. Proptest varies the store; the
// corpus covers each rewrite plus the shapes that must NOT be rewritten.

use proptest::prelude::*;

use saodb::{run_query, ObjectStore, QueryOptions, SaoBuilder, Value};

const QUERY_CORPUS: [&str; 10] = [
    // type-index fast path
    "person.count()",
    "employee{.salary}",
    "person[.salary == 100]",
    // id-index fast path
    "#a1",
    "#a1.count()",
    // type pre-filter with residual predicate
    ".filter(.__types__.contains('person') AND .salary == 100)",
    // not eligible: metacharacters, unanchored, non-root filter
    ".filter(.__id__ =~ '^a.$')",
    ".filter(.__id__ =~ 'a1')",
    "person[.salary == 100][.salary == 100]",
    "@hr",
];

mod strategies {
    use super::*;

    const TYPE_POOL: [&str; 3] = ["person", "employee", "server"];

    pub fn store_strategy() -> impl Strategy<Value = Vec<(String, Vec<String>, i64)>> {
        prop::collection::vec(
            (
                prop::string::string_regex("[a-c][0-9]").unwrap(),
                prop::collection::vec(0usize..TYPE_POOL.len(), 1..=2).prop_map(|mut picks| {
                    picks.sort_unstable();
                    picks.dedup();
                    picks.into_iter().map(|i| TYPE_POOL[i].to_string()).collect()
                }),
                prop_oneof![Just(80i64), Just(100i64), Just(120i64)],
            ),
            0..15,
        )
    }
}

fn build_store(rows: Vec<(String, Vec<String>, i64)>) -> ObjectStore {
    let store = ObjectStore::new();
    let objects = rows
        .into_iter()
        .map(|(id, types, salary)| {
            let mut builder = SaoBuilder::new().id(id).source("hr");
            for t in types {
                builder = builder.object_type(t);
            }
            builder.field("salary", salary).build().unwrap()
        })
        .collect();
    store.replace_provider("hr", objects);
    store
}

fn eval_with(store: &ObjectStore, query: &str, optimize: bool) -> Result<Value, String> {
    let options = QueryOptions {
        optimize,
        profile: false,
    };
    run_query(store.snapshot(), query, options)
        .map(|(value, _)| value)
        .map_err(|e| e.to_string())
}

proptest! {
    // Property: evaluate(Q) with the optimizer equals evaluate(Q) without
    // it, on the same store, for the whole corpus. Errors must agree too.
    #[test]
    fn prop_fast_paths_preserve_semantics(rows in strategies::store_strategy()) {
        let store = build_store(rows);
        for query in QUERY_CORPUS {
            let fast = eval_with(&store, query, true);
            let naive = eval_with(&store, query, false);
            prop_assert_eq!(fast, naive, "query '{}' diverged", query);
        }
    }
}

#[test]
fn test_fast_path_and_naive_agree_on_seeded_store() {
    let store = build_store(vec![
        ("a1".into(), vec!["person".into(), "employee".into()], 100),
        ("b2".into(), vec!["person".into()], 80),
        ("c3".into(), vec!["server".into()], 120),
    ]);
    for query in QUERY_CORPUS {
        assert_eq!(
            eval_with(&store, query, true),
            eval_with(&store, query, false),
            "query '{query}' diverged"
        );
    }
}

/// The fast path must be observable: the profile notes name the index.
#[test]
fn test_fast_path_decisions_are_observable() {
    let store = build_store(vec![("a1".into(), vec!["person".into()], 100)]);
    let options = QueryOptions {
        optimize: true,
        profile: true,
    };

    let (_, report) = run_query(store.snapshot(), "person.count()", options).unwrap();
    assert!(report.unwrap().notes[0].contains("type_index"));

    let (_, report) = run_query(store.snapshot(), "#a1", options).unwrap();
    assert!(report.unwrap().notes[0].contains("id_index"));

    // No rewrite, no note.
    let (_, report) =
        run_query(store.snapshot(), ".filter(.__id__ =~ 'a1')", options).unwrap();
    assert!(report.unwrap().notes.is_empty());
}
