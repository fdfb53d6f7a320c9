use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Config;

const CONFIG_TEMPLATE: &str = r#"# deep-reason configuration
#
# The API key is read from DEEPSEEK_API_KEY by default, including from a
# .env file in the working directory. You can also set it directly in this
# file (not recommended).
# Any key below can be overridden with DEEP_REASON_<KEY>, e.g. DEEP_REASON_MODEL.

# api_key = "sk-..."
base_url = "https://api.deepseek.com"
model = "deepseek-reasoner"
temperature = 0.7
# Set to false to leave temperature out of the request entirely.
send_temperature = true

# "reasoning_task" wraps the question in a structured analysis prompt,
# "raw" sends it unchanged.
prompt_template = "reasoning_task"

# "verbose" renders a five-phase report, "minimal" wraps the raw trace in tags.
format = "verbose"

# Upper bound on one call, stream included.
request_timeout_secs = 600
connect_timeout_secs = 30
"#;

pub fn run() -> Result<()> {
    let config_dir = Config::config_dir()?;
    let config_path = config_dir.join("config.toml");

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

    if config_path.exists() {
        println!("Existing config file found:");
        println!("  {}", config_path.display());
        print!("\nOverwrite? (The existing file will be backed up) [y/N] ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Setup cancelled.");
            return Ok(());
        }

        backup_file(&config_path)?;
    }

    std::fs::write(&config_path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Created {}", config_path.display());

    println!("\nNext steps:");
    println!("  1. Set your API key:   export DEEPSEEK_API_KEY=\"sk-...\"");
    println!("  2. Try a question:     deep-reason ask -q \"Why is the sky blue?\"");
    println!("  3. Register with your MCP client, command: deep-reason serve");

    Ok(())
}

/// Back up a file to <name>.toml.bak, or .toml.bak.N if that is taken.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let mut backup = path.with_extension("toml.bak");
    let mut n = 1;
    while backup.exists() {
        backup = path.with_extension(format!("toml.bak.{}", n));
        n += 1;
    }

    std::fs::rename(path, &backup)
        .with_context(|| format!("Failed to back up {} to {}", path.display(), backup.display()))?;
    println!("  Backed up to {}", backup.display());

    Ok(backup)
}
