//! Inspection of compiled tables, as text or JSON.

use std::fmt::Write as _;

use opendispatch::compiler::CompiledMethod;
use opendispatch::graph::ClassIdx;
use opendispatch::{CompiledTables, InitReport, Target};
use serde::Serialize;

/// Everything the tool prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub report: InitReport,
    pub methods: Vec<MethodTable>,
}

/// Resolution of one method for every concrete argument tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodTable {
    pub name: String,
    pub overriders: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub classes: Vec<String>,
    /// The next chain, most specific first.
    pub chain: Vec<String>,
}

const NOT_IMPLEMENTED: &str = "<not implemented>";
const AMBIGUOUS: &str = "<ambiguous>";

/// Walk every concrete tuple of every method, optionally only `method`.
pub fn inspect(tables: &CompiledTables, method: Option<&str>) -> Inspection {
    let methods = tables
        .methods()
        .iter()
        .enumerate()
        .filter(|(_, m)| method.map_or(true, |name| m.name == name))
        .map(|(index, m)| method_table(tables, index, m))
        .collect();

    Inspection {
        report: tables.report().clone(),
        methods,
    }
}

fn method_table(tables: &CompiledTables, index: usize, method: &CompiledMethod) -> MethodTable {
    let graph = tables.graph();
    let candidates: Vec<Vec<ClassIdx>> = method
        .dims
        .iter()
        .map(|dim| {
            graph
                .class(dim.class)
                .descendants
                .iter()
                .filter(|&c| !graph.class(c).is_abstract)
                .collect()
        })
        .collect();

    let mut rows = Vec::new();
    for tuple in cartesian(&candidates) {
        let chain = match tables.dispatch_cell(index, tuple.iter().copied()) {
            Some(chain) => chain
                .iter()
                .map(|target| match *target {
                    Target::Overrider(o) => method
                        .overriders
                        .get(o as usize)
                        .cloned()
                        .unwrap_or_else(|| format!("#{o}")),
                    Target::NotImplemented => NOT_IMPLEMENTED.to_string(),
                    Target::Ambiguous => AMBIGUOUS.to_string(),
                })
                .collect(),
            None => vec![NOT_IMPLEMENTED.to_string()],
        };
        rows.push(Row {
            classes: tuple.iter().map(|&c| graph.class(c).display_name()).collect(),
            chain,
        });
    }

    MethodTable {
        name: method.name.clone(),
        overriders: method.overriders.clone(),
        rows,
    }
}

fn cartesian(sets: &[Vec<ClassIdx>]) -> Vec<Vec<ClassIdx>> {
    sets.iter().fold(vec![Vec::new()], |acc, set| {
        acc.iter()
            .flat_map(|prefix| {
                set.iter().map(move |&c| {
                    let mut tuple = prefix.clone();
                    tuple.push(c);
                    tuple
                })
            })
            .collect()
    })
}

/// Plain text rendering. `verbose` adds the whole next chain to every row.
pub fn render_text(inspection: &Inspection, verbose: bool) -> String {
    let mut out = String::new();
    let report = &inspection.report;
    let _ = writeln!(out, "{report}");
    for unused in &report.unused {
        let _ = writeln!(out, "unused: {} in {}", unused.overrider, unused.method);
    }
    for ambiguity in &report.ambiguities {
        let _ = writeln!(out, "ambiguous: {}({})", ambiguity.method, ambiguity.classes.join(", "));
    }

    for method in &inspection.methods {
        let _ = writeln!(out, "\n{}", method.name);
        for row in &method.rows {
            let target = if verbose {
                row.chain.join(" -> ")
            } else {
                row.chain.first().cloned().unwrap_or_default()
            };
            let _ = writeln!(out, "  ({}) => {}", row.classes.join(", "), target);
        }
    }
    out
}

pub fn render_json(inspection: &Inspection) -> serde_json::Result<String> {
    serde_json::to_string_pretty(inspection)
}
