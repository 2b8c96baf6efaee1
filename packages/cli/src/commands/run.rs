use super::check::{load_form, read_json};
use super::script::{parse_script, replay, Transcript};
use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use formloom_engine::{Breakpoint, Form, FormEvent, ManagedField};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Form descriptor (JSON array)
    pub form: String,

    /// Edit script (JSON array of steps)
    #[arg(short, long)]
    pub script: String,

    /// Seed document
    #[arg(short, long)]
    pub document: Option<String>,

    /// Breakpoint (overrides config)
    #[arg(short, long)]
    pub breakpoint: Option<Breakpoint>,

    /// Print the transcript as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: RunArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let compiled = Arc::new(load_form(cwd, &args.form)?);

    let script_path = PathBuf::from(cwd).join(&args.script);
    let source = fs::read_to_string(&script_path)
        .with_context(|| format!("Cannot read {}", script_path.display()))?;
    let steps = parse_script(&source)?;

    let mut options = config.form_options();
    if let Some(path) = &args.document {
        options = options.with_document(read_json(cwd, path)?);
    }
    if let Some(breakpoint) = args.breakpoint {
        options = options.with_breakpoint(breakpoint);
    }

    debug!(form = %args.form, steps = steps.len(), mode = ?config.mode, "Replaying script");
    let form = Form::mount(compiled, options)?;
    let transcript = replay(form, steps)?;
    info!(commits = transcript.stats.commits, "Script finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&transcript)?);
    } else {
        print_transcript(&transcript)?;
    }

    Ok(())
}

fn print_transcript(transcript: &Transcript) -> Result<()> {
    println!("{}", "▶ mount".bright_blue().bold());
    print_events(&transcript.mount)?;

    for log in &transcript.steps {
        println!(
            "{} {}",
            format!("▶ {}", log.index).bright_blue().bold(),
            serde_json::to_string(&log.step)?
        );
        print_events(&log.events)?;
    }

    println!();
    println!("{}", "Fields".bright_blue().bold());
    for field in &transcript.fields {
        println!("  {}", describe_field(field));
    }

    println!();
    println!("{}", "Document".bright_blue().bold());
    println!("{}", serde_json::to_string_pretty(&transcript.document)?);

    println!();
    let stats = &transcript.stats;
    let summary = format!(
        "{} commits, {} rejected, {} skipped, {} unchanged",
        stats.commits, stats.rejected, stats.skipped_flushes, stats.unchanged
    );
    if transcript.invalid.is_empty() {
        println!("{} {}", "✅".green(), summary);
    } else {
        println!("{} {} ({} invalid)", "⚠️".yellow(), summary, transcript.invalid.len());
    }

    Ok(())
}

fn print_events(events: &[FormEvent]) -> Result<()> {
    for event in events {
        let line = match event {
            FormEvent::Ready => "ready".green().to_string(),
            FormEvent::Change { document, initial } => format!(
                "{} {}",
                (if *initial { "change (initial)" } else { "change" }).cyan(),
                serde_json::to_string(document)?
            ),
            FormEvent::Invalidity { name, message, .. } => {
                format!("{} {}: {}", "invalid".red(), name, message)
            }
        };
        println!("    {}", line);
    }
    Ok(())
}

fn describe_field(field: &ManagedField) -> String {
    let name = field.name.as_deref().unwrap_or("-");
    let mut line = format!("{} ({}) = {}", name.bold(), field.kind, field.value);

    let mut flags = Vec::new();
    if !field.visible {
        flags.push("hidden".to_string());
    }
    if field.disabled {
        flags.push("disabled".to_string());
    }
    if field.readonly {
        flags.push("readonly".to_string());
    }
    if field.loading {
        flags.push("loading".to_string());
    }
    if let Some(message) = &field.invalid {
        flags.push(format!("invalid: {}", message).red().to_string());
    }
    if let Some(message) = &field.incorrect {
        flags.push(format!("incorrect: {}", message).yellow().to_string());
    }
    if !flags.is_empty() {
        line.push_str(&format!(" [{}]", flags.join(", ")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_run_sample_project() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();
        super::super::init(
            super::super::InitArgs {
                dir: ".".into(),
                force: false,
            },
            &cwd,
        )
        .unwrap();

        run(
            RunArgs {
                form: "form.json".into(),
                script: "script.json".into(),
                document: None,
                breakpoint: None,
                json: true,
            },
            &cwd,
        )
        .unwrap();
    }

    #[test]
    fn test_run_reports_unknown_field() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("form.json"), r#"[{ "type": "text", "name": "a" }]"#).unwrap();
        fs::write(
            dir.path().join("script.json"),
            r#"[{ "step": "blur", "field": "b" }]"#,
        )
        .unwrap();

        let err = run(
            RunArgs {
                form: "form.json".into(),
                script: "script.json".into(),
                document: None,
                breakpoint: None,
                json: false,
            },
            &dir.path().display().to_string(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no field named 'b'"));
    }
}
