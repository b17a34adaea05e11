// Result Rendering
// Formats query results for the terminal:
//
// - a single SAO as a header card with indented user fields
// - an object list sharing one (type, id) as a source-grouped card
// - a mixed object list as one `type#id@source` line per object
// - an object grouping as per-key headers with indented children
// - primitives as-is; lists and maps in compact JSON form

use std::fmt::Write as _;
use std::sync::Arc;

use crate::value::{ObjectGrouping, Sao, Value};

/// Render any query result to its textual form.
pub fn render_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    // A single trailing newline keeps multi-section output tidy without
    // double-spacing scalar results.
    while out.ends_with('\n') {
        out.pop();
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Str(s) => {
            indent(out, depth);
            let _ = writeln!(out, "{s}");
        }
        Value::Int(n) => {
            indent(out, depth);
            let _ = writeln!(out, "{n}");
        }
        Value::Float(x) => {
            indent(out, depth);
            let _ = writeln!(out, "{x}");
        }
        Value::Bool(b) => {
            indent(out, depth);
            let _ = writeln!(out, "{b}");
        }
        Value::Null => {
            indent(out, depth);
            let _ = writeln!(out, "null");
        }
        Value::AbsorbingNone => {
            indent(out, depth);
            let _ = writeln!(out, "(none)");
        }
        Value::List(_) | Value::Map(_) => {
            indent(out, depth);
            let _ = writeln!(out, "{}", inline(value));
        }
        Value::Chain(chain) => {
            indent(out, depth);
            let _ = writeln!(out, "{chain}");
        }
        Value::Object(sao) => write_sao(out, sao, depth),
        Value::Objects(objects) => write_objects(out, objects, depth),
        Value::Grouping(grouping) => write_grouping(out, grouping, depth),
    }
}

/// Compact single-line rendering for field values and containers.
fn inline(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Int(n) => n.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::AbsorbingNone => "(none)".to_string(),
        Value::Object(sao) => sao.handle(),
        Value::Objects(objects) => {
            let handles: Vec<String> = objects.iter().map(|s| s.handle()).collect();
            format!("[{}]", handles.join(", "))
        }
        other => {
            if let Some(link) = other.as_link() {
                match link.label {
                    Some(label) => format!("link({label})"),
                    None => format!("link({})", link.query),
                }
            } else {
                other.to_display_json().to_string()
            }
        }
    }
}

/// `<id> (type @source)` header plus indented user fields.
fn write_sao(out: &mut String, sao: &Sao, depth: usize) {
    indent(out, depth);
    let _ = writeln!(
        out,
        "{} ({} @{})",
        sao.id(),
        sao.primary_type(),
        sao.source()
    );
    for (key, value) in sao.fields() {
        indent(out, depth + 1);
        let _ = writeln!(out, "{key}: {}", inline(value));
    }
}

fn write_objects(out: &mut String, objects: &[Arc<Sao>], depth: usize) {
    match objects {
        [] => {
            indent(out, depth);
            let _ = writeln!(out, "(no objects)");
        }
        [only] => write_sao(out, only, depth),
        objects if shares_logical_identity(objects) => {
            // One logical object seen by several sources.
            indent(out, depth);
            let _ = writeln!(
                out,
                "{}#{}",
                objects[0].primary_type(),
                objects[0].id()
            );
            for sao in objects {
                indent(out, depth + 1);
                let _ = writeln!(out, "@{}:", sao.source());
                for (key, value) in sao.fields() {
                    indent(out, depth + 2);
                    let _ = writeln!(out, "{key}: {}", inline(value));
                }
            }
        }
        objects => {
            for sao in objects {
                indent(out, depth);
                let _ = writeln!(out, "{}", sao.handle());
            }
        }
    }
}

fn shares_logical_identity(objects: &[Arc<Sao>]) -> bool {
    let first = &objects[0];
    objects[1..]
        .iter()
        .all(|sao| sao.id() == first.id() && sao.primary_type() == first.primary_type())
}

fn write_grouping(out: &mut String, grouping: &ObjectGrouping, depth: usize) {
    if grouping.is_empty() {
        indent(out, depth);
        let _ = writeln!(out, "(no groups)");
        return;
    }
    for (key, members) in grouping.iter() {
        indent(out, depth);
        let _ = writeln!(out, "{key}");
        write_objects(out, members, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::SaoBuilder;
    use crate::value::GroupKey;

    fn alice() -> Arc<Sao> {
        Arc::new(
            SaoBuilder::new()
                .id("a")
                .source("hr")
                .object_type("person")
                .field("name", "Alice")
                .field("salary", 100i64)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_single_sao_card() {
        let text = render_value(&Value::Object(alice()));
        assert_eq!(text, "a (person @hr)\n  name: Alice\n  salary: 100");
    }

    #[test]
    fn test_mixed_list_renders_handles() {
        let bob = Arc::new(
            SaoBuilder::new()
                .id("b")
                .source("hr")
                .object_type("person")
                .build()
                .unwrap(),
        );
        let text = render_value(&Value::Objects(vec![alice(), bob]));
        assert_eq!(text, "person#a@hr\nperson#b@hr");
    }

    #[test]
    fn test_same_logical_identity_groups_by_source() {
        let from_crm = Arc::new(
            SaoBuilder::new()
                .id("a")
                .source("crm")
                .object_type("person")
                .field("name", "Alice A.")
                .build()
                .unwrap(),
        );
        let text = render_value(&Value::Objects(vec![alice(), from_crm]));
        assert!(text.starts_with("person#a\n"));
        assert!(text.contains("@hr:"));
        assert!(text.contains("@crm:"));
        assert!(text.contains("name: Alice A."));
    }

    #[test]
    fn test_grouping_renders_key_headers() {
        let mut grouping = ObjectGrouping::new();
        grouping.push(
            GroupKey::try_from_value(&Value::Str("eu".into())).unwrap(),
            alice(),
        );
        let text = render_value(&Value::Grouping(grouping));
        assert!(text.starts_with("[eu]\n"));
        assert!(text.contains("a (person @hr)"));
    }

    #[test]
    fn test_primitives_render_bare() {
        assert_eq!(render_value(&Value::Int(3)), "3");
        assert_eq!(render_value(&Value::Str("Bob".into())), "Bob");
        assert_eq!(render_value(&Value::AbsorbingNone), "(none)");
    }
}
