// Query Profiling
// Per-query hierarchical timing, keyed by operator. Each node aggregates the
// invocations of one operator beneath its parent operator, with cumulative
// counts, totals, and averages, plus the optimizer's fast-path notes. The
// collector is a no-op unless the query asked for profiling.

use std::fmt;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

#[derive(Debug)]
struct Node {
    name: String,
    count: u64,
    total: Duration,
    children: IndexMap<String, usize>,
}

impl Node {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            count: 0,
            total: Duration::ZERO,
            children: IndexMap::new(),
        }
    }
}

/// Collects operator timings for one evaluator.
#[derive(Debug)]
pub struct QueryProfiler {
    enabled: bool,
    nodes: Vec<Node>,
    roots: IndexMap<String, usize>,
    stack: Vec<(usize, Instant)>,
    notes: Vec<String>,
}

impl QueryProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            nodes: Vec::new(),
            roots: IndexMap::new(),
            stack: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn enter(&mut self, operator: &str) {
        if !self.enabled {
            return;
        }
        let parent = self.stack.last().map(|(idx, _)| *idx);
        let existing = match parent {
            Some(p) => self.nodes[p].children.get(operator).copied(),
            None => self.roots.get(operator).copied(),
        };
        let idx = match existing {
            Some(idx) => idx,
            None => {
                let idx = self.nodes.len();
                self.nodes.push(Node::new(operator));
                match parent {
                    Some(p) => {
                        self.nodes[p].children.insert(operator.to_string(), idx);
                    }
                    None => {
                        self.roots.insert(operator.to_string(), idx);
                    }
                }
                idx
            }
        };
        self.stack.push((idx, Instant::now()));
    }

    pub fn exit(&mut self) {
        if !self.enabled {
            return;
        }
        if let Some((idx, started)) = self.stack.pop() {
            self.nodes[idx].count += 1;
            self.nodes[idx].total += started.elapsed();
        }
    }

    pub fn note(&mut self, note: String) {
        if self.enabled {
            self.notes.push(note);
        }
    }

    /// Consume the collected data into a report, if profiling was on.
    pub fn take_report(&mut self) -> Option<ProfileReport> {
        if !self.enabled {
            return None;
        }
        let mut lines = Vec::new();
        let roots = std::mem::take(&mut self.roots);
        for &idx in roots.values() {
            self.render_node(idx, 0, &mut lines);
        }
        Some(ProfileReport {
            lines,
            notes: std::mem::take(&mut self.notes),
        })
    }

    fn render_node(&self, idx: usize, depth: usize, lines: &mut Vec<ProfileLine>) {
        let node = &self.nodes[idx];
        let avg = if node.count > 0 {
            node.total / node.count as u32
        } else {
            Duration::ZERO
        };
        lines.push(ProfileLine {
            depth,
            operator: node.name.clone(),
            count: node.count,
            total: node.total,
            average: avg,
        });
        for &child in node.children.values() {
            self.render_node(child, depth + 1, lines);
        }
    }
}

/// One row of the timing breakdown.
#[derive(Debug, Clone)]
pub struct ProfileLine {
    pub depth: usize,
    pub operator: String,
    pub count: u64,
    pub total: Duration,
    pub average: Duration,
}

/// The rendered timing breakdown for one query.
#[derive(Debug, Clone)]
pub struct ProfileReport {
    pub lines: Vec<ProfileLine>,
    pub notes: Vec<String>,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}

impl fmt::Display for ProfileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "query profile:")?;
        for line in &self.lines {
            writeln!(
                f,
                "  {:indent$}{:<16} count={:<6} total={:.3}ms avg={:.3}ms",
                "",
                line.operator,
                line.count,
                millis(line.total),
                millis(line.average),
                indent = line.depth * 2,
            )?;
        }
        if !self.notes.is_empty() {
            writeln!(f, "fast paths:")?;
            for note in &self.notes {
                writeln!(f, "  {note}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_profiler_collects_nothing() {
        let mut profiler = QueryProfiler::new(false);
        profiler.enter("filter");
        profiler.exit();
        assert!(profiler.take_report().is_none());
    }

    #[test]
    fn test_nesting_and_counts() {
        let mut profiler = QueryProfiler::new(true);
        for _ in 0..3 {
            profiler.enter("filter");
            profiler.enter("get_field");
            profiler.exit();
            profiler.exit();
        }
        profiler.note("filter → type_index ('person')".into());

        let report = profiler.take_report().unwrap();
        assert_eq!(report.lines.len(), 2);
        assert_eq!(report.lines[0].operator, "filter");
        assert_eq!(report.lines[0].count, 3);
        assert_eq!(report.lines[1].depth, 1);
        assert_eq!(report.lines[1].operator, "get_field");
        assert_eq!(report.notes.len(), 1);
        assert!(report.to_string().contains("type_index"));
    }
}
