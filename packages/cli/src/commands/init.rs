use crate::config::{Config, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

const SAMPLE_FORM: &str = r#"[
  { "type": "text", "name": "account.email", "validation": { "required": true, "pattern": "^[^@]+@[^@]+$" } },
  { "type": "paper", "fields": [
    { "type": "text", "name": "account.password", "validation": { "required": true, "minLength": 8 } },
    { "type": "checkbox", "name": "newsletter" }
  ]},
  { "type": "expansion", "title": "Plan", "fields": [
    { "type": "radio", "name": "plan", "radioValue": "free" },
    { "type": "radio", "name": "plan", "radioValue": "pro" }
  ]},
  { "type": "button", "name": "submit", "title": "Sign up" }
]
"#;

const SAMPLE_SCRIPT: &str = r#"[
  { "step": "focus", "field": "account.email" },
  { "step": "change", "field": "account.email", "value": "ada" },
  { "step": "blur", "field": "account.email" },
  { "step": "change", "field": "account.email", "value": "ada@example.com" },
  { "step": "advance", "ms": 300 },
  { "step": "change", "field": "account.password", "value": "correct horse" },
  { "step": "change", "field": "plan", "value": "pro" },
  { "step": "change", "field": "newsletter", "value": true }
]
"#;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Directory for form.json and script.json
    #[arg(short, long, default_value = ".")]
    pub dir: String,

    /// Force overwrite existing files
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    // Check if config already exists
    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing Formloom project...".bright_blue().bold());

    let dir = PathBuf::from(cwd).join(&args.dir);
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
        println!("  {} Created {}/", "✓".green(), args.dir);
    }

    for (file, content) in [("form.json", SAMPLE_FORM), ("script.json", SAMPLE_SCRIPT)] {
        let path = dir.join(file);
        if !path.exists() || args.force {
            fs::write(&path, content)?;
            println!("  {} Created {}", "✓".green(), file);
        }
    }

    let config_json = serde_json::to_string_pretty(&Config::default())?;
    fs::write(&config_path, config_json)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    println!();
    println!("{}", "✅ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Run: formloom check {}/form.json", args.dir);
    println!(
        "  2. Run: formloom run {0}/form.json --script {0}/script.json",
        args.dir
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::script::parse_script;
    use formloom_descriptor::{compile, parse_fields};

    #[test]
    fn test_samples_parse() {
        let fields = parse_fields(SAMPLE_FORM).unwrap();
        let compiled = compile(&fields).unwrap();
        assert_eq!(compiled.by_name("plan").len(), 2);
        assert_eq!(parse_script(SAMPLE_SCRIPT).unwrap().len(), 8);
    }

    #[test]
    fn test_init_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();
        init(
            InitArgs {
                dir: "forms".into(),
                force: false,
            },
            &cwd,
        )
        .unwrap();

        assert!(dir.path().join("forms/form.json").exists());
        assert!(dir.path().join("forms/script.json").exists());
        assert_eq!(Config::load(&cwd).unwrap(), Config::default());
    }
}
