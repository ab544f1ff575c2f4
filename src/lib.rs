pub mod cli;
pub mod coindex;
pub mod error;
pub mod location;
pub mod matcher;
pub mod op;
pub mod pattern;
pub mod script;
pub mod template;
pub mod tree;

use std::io::Read;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use cli::Args;
use pattern::SurgeryPattern;
use tree::Tree;

pub use error::{CompileError, RuntimeError};
pub use matcher::{LabelMatcher, MatchContext, StaticMatcher};
pub use tree::NodeId;

/// One input file's surviving trees, for `--format json`.
#[derive(Debug, Serialize)]
struct FileOutcome {
    path: String,
    trees: Vec<String>,
}

/// Run the tool. Returns the exit code: 0 = done, 2 = usage error.
pub fn run(args: Args) -> Result<i32> {
    let scripts = collect_scripts(&args)?;
    if scripts.is_empty() {
        eprintln!("error: no operations given (use --script or --expr)");
        return Ok(2);
    }

    let compile_start = Instant::now();
    let patterns = scripts
        .iter()
        .map(|line| {
            SurgeryPattern::compile(line).with_context(|| format!("in operation `{line}`"))
        })
        .collect::<Result<Vec<_>>>()?;
    let matcher = args.label_matcher()?;

    if args.debug {
        eprintln!(
            "debug: compiled {} operation(s) in {:.0?}",
            patterns.len(),
            compile_start.elapsed()
        );
        for pattern in &patterns {
            eprintln!("debug: op: {pattern}");
        }
    }

    let mut outcomes = Vec::new();
    if args.paths.is_empty() {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        let trees = Tree::parse_forest(&input).context("parsing trees from stdin")?;
        outcomes.push(process_file("-", trees, &patterns, &matcher, &args));
    } else {
        for path in &args.paths {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let trees = Tree::parse_forest(&text)
                .with_context(|| format!("parsing trees in {}", path.display()))?;
            outcomes.push(process_file(
                &path.display().to_string(),
                trees,
                &patterns,
                &matcher,
                &args,
            ));
        }
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        _ => {
            for outcome in &outcomes {
                for tree in &outcome.trees {
                    println!("{tree}");
                }
            }
        }
    }
    Ok(0)
}

fn process_file(
    path: &str,
    mut trees: Vec<Tree>,
    patterns: &[SurgeryPattern],
    matcher: &LabelMatcher,
    args: &Args,
) -> FileOutcome {
    let start = Instant::now();
    let before = trees.len();
    for pattern in patterns {
        trees = pattern.apply_to_many(trees, || matcher.clone());
    }
    if args.debug {
        eprintln!(
            "debug: {path}: {before} tree(s) in, {} out, {:.0?}",
            trees.len(),
            start.elapsed()
        );
    }
    FileOutcome {
        path: path.to_string(),
        trees: trees.iter().map(Tree::to_string).collect(),
    }
}

/// Gather script lines from `--script` and `--expr`, dropping blank lines and
/// `#` comment lines.
fn collect_scripts(args: &Args) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    if let Some(path) = &args.script {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            lines.push(line.to_string());
        }
    }
    lines.extend(args.expr.iter().map(|e| e.trim().to_string()));
    lines.retain(|l| !l.is_empty());
    Ok(lines)
}
