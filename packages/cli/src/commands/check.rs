use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use formloom_descriptor::{compile, parse_fields, CompiledForm, CompiledNode};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Form descriptor (JSON array)
    pub form: String,

    /// Seed document merged under the defaults
    #[arg(short, long)]
    pub document: Option<String>,
}

pub fn check(args: CheckArgs, cwd: &str) -> Result<()> {
    let compiled = load_form(cwd, &args.form)?;
    let seed = match &args.document {
        Some(path) => read_json(cwd, path)?,
        None => Value::Null,
    };

    println!("{}", "🔍 Form tree".bright_blue().bold());
    for line in render_tree(&compiled) {
        println!("  {}", line);
    }

    let document = compiled.initial_document(&seed)?;
    println!();
    println!("{}", "📄 Initial document".bright_blue().bold());
    println!("{}", serde_json::to_string_pretty(&document)?);
    println!();
    println!(
        "{} {} nodes, {} stateful",
        "✅".green(),
        compiled.len(),
        compiled.stateful_count()
    );

    Ok(())
}

pub fn load_form(cwd: &str, path: &str) -> Result<CompiledForm> {
    let full = PathBuf::from(cwd).join(path);
    let source = fs::read_to_string(&full).with_context(|| format!("Cannot read {}", full.display()))?;
    let fields = parse_fields(&source).with_context(|| format!("Invalid form {}", path))?;
    Ok(compile(&fields)?)
}

pub fn read_json(cwd: &str, path: &str) -> Result<Value> {
    let full = PathBuf::from(cwd).join(path);
    let source = fs::read_to_string(&full).with_context(|| format!("Cannot read {}", full.display()))?;
    Ok(serde_json::from_str(&source)?)
}

/// One line per node, indented by depth
pub fn render_tree(compiled: &CompiledForm) -> Vec<String> {
    compiled.nodes().iter().map(describe).collect()
}

fn describe(node: &CompiledNode) -> String {
    let mut line = format!("{}{}", "  ".repeat(node.depth), node.kind().type_name());
    if let Some(name) = node.name() {
        line.push_str(&format!(" {}", name.bold()));
    }

    let descriptor = &node.descriptor;
    let mut flags = Vec::new();
    if descriptor.validation.is_some() {
        flags.push("validated");
    }
    if descriptor.disabled {
        flags.push("disabled");
    }
    if descriptor.readonly {
        flags.push("readonly");
    }
    if descriptor.phone_hidden || descriptor.tablet_hidden || descriptor.desktop_hidden {
        flags.push("breakpoint-hidden");
    }
    if !flags.is_empty() {
        line.push_str(&format!(" {}", format!("[{}]", flags.join(", ")).dimmed()));
    }
    line
}
