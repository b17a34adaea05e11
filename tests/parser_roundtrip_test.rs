// Parser Round-Trip Tests
// The canonical text form of a chain must re-parse to the identical chain,
// and rendering an already-canonical query must be a fixed point. Grammar
// error classes are covered inline in src/parser.rs; this file exercises
// the surface as a whole.

use pretty_assertions::assert_eq;
use saodb::parse_query;

/// parse -> render -> parse is identity on the chain.
fn assert_roundtrip(query: &str) {
    let chain = parse_query(query).unwrap_or_else(|e| panic!("parse '{query}': {e}"));
    let rendered = chain.to_string();
    let reparsed = parse_query(&rendered)
        .unwrap_or_else(|e| panic!("reparse '{rendered}' (from '{query}'): {e}"));
    assert_eq!(chain, reparsed, "query '{query}' rendered as '{rendered}'");
}

#[test]
fn test_roundtrip_corpus() {
    for query in [
        ".",
        "*",
        "*.count()",
        "person",
        "person.count()",
        "#a",
        "#'spaced id'",
        "@hr",
        ".name",
        ".__types__",
        "person[.salary == 100]",
        "person[0]",
        "person[0].name",
        "person{.name}",
        "person{.name, .salary}",
        "person.lowest(.salary).name",
        "server.grouped_lowest(.latency, .region)",
        "person.grouped_filter(.count() == 2, .salary)",
        ".filter(.__types__.contains('person') AND .salary == 100)",
        ".filter(.__id__ =~ '^a$')",
        ".a == .b OR NOT (.c =~ '^x$')",
        "(.a == 1 OR .b == 2) AND .c == 3",
        "person.name.single()",
        "person.company.value()",
        "'plain string'",
        "'escaped \\' quote'",
        "\"double quoted\"",
        "-5",
        "100",
        "1.5",
        "-2.25",
        "true",
        "false",
        "null",
        ".get_field('not an ident')",
    ] {
        assert_roundtrip(query);
    }
}

/// Queries already in canonical form render back to themselves.
#[test]
fn test_canonical_fixed_points() {
    for query in [
        ".filter(.__types__.contains('person'))",
        ".filter(.__id__.regex_match('^a$'))",
        ".name",
        ".count()",
        ".equals(.a, 1)",
        ".filter(.__types__.contains('person'))[0]",
        "'text'",
        "1.5",
    ] {
        let rendered = parse_query(query).unwrap().to_string();
        assert_eq!(rendered, query, "canonical query changed under rendering");
    }
}

/// The sugared forms and their explicit desugarings are the same chain.
#[test]
fn test_sugar_equivalences() {
    for (sugar, explicit) in [
        ("person", ".filter(.__types__.contains('person'))"),
        ("person", ".filter(.__types__.includes('person'))"),
        ("#a", ".filter(.__id__ =~ '^a$')"),
        ("@hr", ".filter(.equals(.__source__, 'hr'))"),
        ("person{.name}", "person.select(.name)"),
        (".a == .b", ".equals(.a, .b)"),
        ("!.a", ".not(.a)"),
        ("NOT .a", ".not(.a)"),
        (".a && .b", ".and(.a, .b)"),
        (".a AND .b", ".and(.a, .b)"),
        (".a || .b", ".or(.a, .b)"),
        ("person[3]", "person.index(3)"),
    ] {
        assert_eq!(
            parse_query(sugar).unwrap(),
            parse_query(explicit).unwrap(),
            "'{sugar}' should desugar to '{explicit}'"
        );
    }
}
