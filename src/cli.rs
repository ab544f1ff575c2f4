use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use regex::Regex;

use crate::matcher::LabelMatcher;

#[derive(Parser, Debug)]
#[command(
    name = "treesurgeon",
    version,
    about = "Tree surgery over Penn-style bracketed trees"
)]
pub struct Args {
    /// Tree files (bracketed trees, whitespace separated)
    pub paths: Vec<PathBuf>,

    /// Script file, one operation per line (`#` lines are comments)
    #[arg(short, long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Inline operation (repeatable; runs after --script, in order)
    #[arg(short = 'e', long = "expr", value_name = "OP")]
    pub expr: Vec<String>,

    /// Match specification: NAME=/REGEX/ binds NAME to the first node whose
    /// label matches REGEX; named capture groups become string variables
    #[arg(short, long = "match", value_name = "SPEC")]
    pub matcher: String,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Build the matcher from the `--match` specification.
    pub fn label_matcher(&self) -> Result<LabelMatcher> {
        let (name, pattern) = parse_match_spec(&self.matcher)?;
        Ok(LabelMatcher::new(name, pattern))
    }
}

/// Parse `NAME=/REGEX/` into its parts.
fn parse_match_spec(spec: &str) -> Result<(String, Regex)> {
    let Some((name, rest)) = spec.split_once('=') else {
        bail!("invalid match spec `{spec}` (expected NAME=/REGEX/)");
    };
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        bail!("invalid match name `{name}` in `{spec}`");
    }
    let Some(body) = rest
        .strip_prefix('/')
        .and_then(|r| r.strip_suffix('/'))
    else {
        bail!("invalid match spec `{spec}` (regex must be /-delimited)");
    };
    let regex = Regex::new(body).with_context(|| format!("invalid regex in `{spec}`"))?;
    Ok((name.to_string(), regex))
}
