//! Dev tooling, invoked as `cargo run -p xtask -- <command>`. Kept
//! dependency-free beyond what the workspace already carries: no clap,
//! just a small hand-rolled subcommand dispatch.

use anyhow::{bail, Context};
use bpmn_lite_core::model::definition::{load_definition, BpmnParser};
use bpmn_lite_core::model::xml_parser::QuickXmlBpmnParser;
use std::env;
use std::fs;

fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("lint-bpmn") => {
            let path = args.next().context("usage: xtask lint-bpmn <file.bpmn>")?;
            lint_bpmn(&path)
        }
        Some(other) => bail!("unknown xtask command: {other}"),
        None => {
            eprintln!("commands:");
            eprintln!("  lint-bpmn <file.bpmn>   parse and cross-link a definition, report node counts");
            Ok(())
        }
    }
}

/// Parses `path` with the reference XML parser and runs it through the
/// same loader the engine uses, surfacing cross-linking warnings
/// (missing flow endpoints, unreachable nodes) before it ever reaches a
/// running instance.
fn lint_bpmn(path: &str) -> anyhow::Result<()> {
    let source = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let parser = QuickXmlBpmnParser::new();
    let tree = parser.parse(&source)?;
    let definition_key = tree.root_process_id.clone();
    let def = load_definition(&definition_key, &source, tree);

    println!("definition key: {}", def.key);
    println!("processes: {}", def.processes.len());
    println!("nodes: {}", def.nodes.len());
    println!("flows: {}", def.flows.len());
    for (id, process) in &def.processes {
        println!(
            "  process {id}: {} start node(s), {} child node(s)",
            process.start_nodes.len(),
            process.children_nodes.len()
        );
    }
    Ok(())
}
