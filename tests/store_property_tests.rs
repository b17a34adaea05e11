// Property-Based Store Tests
// Proptest drives arbitrary provider contributions through the store and
// checks the structural invariants: every secondary index is exactly a
// projection of the primary storage, duplicate identities collapse, and
// query evaluation never disturbs a snapshot.

use std::sync::Arc;

use proptest::prelude::*;

use saodb::{run_query, ObjectStore, QueryOptions, Sao, SaoBuilder, Value};

// Custom strategies for generating contribution data
mod strategies {
    use super::*;

    const TYPE_POOL: [&str; 4] = ["person", "employee", "server", "asset"];

    pub fn object_id_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-d][0-9]?").unwrap()
    }

    /// A non-empty, duplicate-free subset of the type pool.
    pub fn types_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(0usize..TYPE_POOL.len(), 1..=3).prop_map(|mut picks| {
            picks.sort_unstable();
            picks.dedup();
            picks.into_iter().map(|i| TYPE_POOL[i].to_string()).collect()
        })
    }

    pub fn sao_strategy(source: &'static str) -> impl Strategy<Value = Sao> {
        (object_id_strategy(), types_strategy(), 0i64..1000).prop_map(
            move |(id, types, salary)| {
                let mut builder = SaoBuilder::new().id(id).source(source);
                for t in types {
                    builder = builder.object_type(t);
                }
                builder.field("salary", salary).build().unwrap()
            },
        )
    }

    pub fn contribution_strategy(source: &'static str) -> impl Strategy<Value = Vec<Sao>> {
        prop::collection::vec(sao_strategy(source), 0..12)
    }
}

proptest! {
    // Invariant: by_type, by_id, by_logical, and by_key always agree with
    // the contribution set, for any interleaving of provider replacements.
    #[test]
    fn prop_indexes_stay_consistent(
        hr in strategies::contribution_strategy("hr"),
        ops in strategies::contribution_strategy("ops"),
        hr_again in strategies::contribution_strategy("hr"),
    ) {
        let store = ObjectStore::new();
        store.replace_provider("hr", hr);
        prop_assert!(store.snapshot().check_invariants().is_ok());

        store.replace_provider("ops", ops);
        prop_assert!(store.snapshot().check_invariants().is_ok());

        // Replacing hr swaps its whole contribution; ops is untouched.
        let ops_before: Vec<String> = store
            .snapshot()
            .contribution("ops")
            .iter()
            .map(|sao| sao.id().to_string())
            .collect();
        store.replace_provider("hr", hr_again);
        let snapshot = store.snapshot();
        prop_assert!(snapshot.check_invariants().is_ok());
        let ops_after: Vec<String> = snapshot
            .contribution("ops")
            .iter()
            .map(|sao| sao.id().to_string())
            .collect();
        prop_assert_eq!(ops_before, ops_after);
    }
}

proptest! {
    // Invariant: within one contribution, objects sharing (id, source)
    // collapse to the last occurrence.
    #[test]
    fn prop_duplicate_identities_collapse(objects in strategies::contribution_strategy("hr")) {
        let mut distinct: Vec<(String, String)> = objects
            .iter()
            .map(|sao| (sao.id().to_string(), sao.source().to_string()))
            .collect();
        distinct.sort();
        distinct.dedup();

        let store = ObjectStore::new();
        store.replace_provider("hr", objects);
        prop_assert_eq!(store.snapshot().len(), distinct.len());
    }
}

proptest! {
    // Invariant: evaluating queries never mutates the store; the snapshot
    // taken before the query is the snapshot after it, object for object.
    #[test]
    fn prop_queries_leave_snapshots_untouched(objects in strategies::contribution_strategy("hr")) {
        let store = ObjectStore::new();
        store.replace_provider("hr", objects);

        let before = store.snapshot();
        let before_objects: Vec<Sao> =
            before.all().iter().map(|sao| (**sao).clone()).collect();

        for query in [
            "person.count()",
            "person[.salary == 500]",
            "employee{.salary}",
            "#a",
            "server.lowest(.salary)",
        ] {
            let _ = run_query(store.snapshot(), query, QueryOptions::default());
        }

        let after = store.snapshot();
        prop_assert!(Arc::ptr_eq(&before, &after));
        let after_objects: Vec<Sao> =
            after.all().iter().map(|sao| (**sao).clone()).collect();
        prop_assert_eq!(before_objects, after_objects);
    }
}

proptest! {
    // by_type answers exactly the naive scan, which is what makes the
    // optimizer's type fast path safe.
    #[test]
    fn prop_type_index_matches_scan(
        hr in strategies::contribution_strategy("hr"),
        ops in strategies::contribution_strategy("ops"),
    ) {
        let store = ObjectStore::new();
        store.replace_provider("hr", hr);
        store.replace_provider("ops", ops);
        let snapshot = store.snapshot();

        for type_name in ["person", "employee", "server", "asset", "ghost"] {
            let scanned: Vec<String> = snapshot
                .all()
                .iter()
                .filter(|sao| sao.types().contains(type_name))
                .map(|sao| sao.handle())
                .collect();
            let indexed: Vec<String> = snapshot
                .by_type(type_name)
                .iter()
                .map(|sao| sao.handle())
                .collect();
            prop_assert_eq!(scanned, indexed);
        }
    }
}

#[test]
fn test_empty_store_queries() {
    let store = ObjectStore::new();
    let (value, _) =
        run_query(store.snapshot(), "person.count()", QueryOptions::default()).unwrap();
    assert_eq!(value, Value::Int(0));
}
