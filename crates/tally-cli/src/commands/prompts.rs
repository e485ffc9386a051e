//! Prompt template inspection
//!
//! Besides listing and showing templates, these commands check an override
//! against the variables Tally fills in, since a misspelled placeholder is
//! sent to the model verbatim.

use anyhow::Result;
use tally_core::prompts::{default_prompts_dir, PromptId, PromptLibrary};

/// Problems with a template's placeholders, one line each
pub fn variable_issues(id: PromptId, used: &[String]) -> Vec<String> {
    let supplied = id.supplied_variables();
    let mut issues: Vec<String> = used
        .iter()
        .filter(|name| !supplied.contains(&name.as_str()))
        .map(|name| format!("{{{{{}}}}} is never filled in", name))
        .collect();
    issues.extend(
        supplied
            .iter()
            .filter(|name| !used.iter().any(|u| u == *name))
            .map(|name| format!("{{{{{}}}}} is not used", name)),
    );
    issues
}

/// List prompts with their source and placeholders
pub fn cmd_prompts_list() -> Result<()> {
    let mut library = PromptLibrary::new();

    println!(
        "{:<22} {:>3}  {:<16}  {:<9}  {}",
        "PROMPT", "V", "SCHEMA", "SOURCE", "VARIABLES"
    );
    println!("{}", "-".repeat(78));

    let mut warnings = Vec::new();
    for info in library.list() {
        let source = if info.has_override {
            "override"
        } else {
            "built-in"
        };
        println!(
            "{:<22} {:>3}  {:<16}  {:<9}  {}",
            info.id,
            info.version,
            info.schema,
            source,
            info.variables.join(", ")
        );

        if let Ok(id) = info.id.parse::<PromptId>() {
            warnings.extend(
                variable_issues(id, &info.variables)
                    .into_iter()
                    .map(|issue| format!("{}: {}", info.id, issue)),
            );
        }
    }

    if !warnings.is_empty() {
        println!();
        for warning in warnings {
            println!("⚠️  {}", warning);
        }
    }

    println!();
    println!("Overrides are <id>.md files in the directory shown by `tally prompts path`.");

    Ok(())
}

/// Print one prompt, section by section
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let id: PromptId = match prompt_id.parse() {
        Ok(id) => id,
        Err(msg) => {
            let known: Vec<&str> = PromptId::all().iter().map(PromptId::as_str).collect();
            eprintln!("{} (known: {})", msg, known.join(", "));
            return Ok(());
        }
    };

    let mut library = PromptLibrary::new();
    let prompt = library.get(id)?;

    let origin = match &prompt.override_path {
        Some(path) => path.display().to_string(),
        None => "built-in".to_string(),
    };
    println!(
        "{} v{} -> {} ({})",
        prompt.metadata.id, prompt.metadata.version, prompt.metadata.schema, origin
    );

    let used = prompt.variables();
    println!("Variables: {}", used.join(", "));
    for issue in variable_issues(id, &used) {
        println!("⚠️  {}", issue);
    }

    println!();
    println!("=== System ===");
    println!("{}", prompt.system_section().unwrap_or("(none)"));
    println!();
    println!("=== User ===");
    match prompt.user_section() {
        Some(user) => println!("{}", user),
        None => println!("(missing - this prompt cannot be rendered)"),
    }

    Ok(())
}

/// Print the override directory and what is in it
pub fn cmd_prompts_path() -> Result<()> {
    let Some(dir) = default_prompts_dir() else {
        eprintln!("No data directory on this system; prompt overrides are unavailable.");
        return Ok(());
    };

    println!("{}", dir.display());

    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("(directory does not exist yet)");
            return Ok(());
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let stem = name.strip_suffix(".md").unwrap_or(&name);
        if stem.parse::<PromptId>().is_ok() {
            println!("  ✓ {}", name);
        } else {
            println!("  ? {} (not a known prompt id, ignored)", name);
        }
    }

    Ok(())
}
