//! Voicetype - Hotkey-driven voice dictation for Wayland
//!
//! Run with `voicetype` or `voicetype daemon` to start the daemon.
//! Use `voicetype setup` to check dependencies and create the data layout.
//! Use `voicetype stats` to see usage rollups.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use voicetype::config::{self, Config};
use voicetype::daemon::Daemon;
use voicetype::store::StatsStore;

#[derive(Parser)]
#[command(name = "voicetype")]
#[command(author, version, about = "Hotkey-driven voice dictation for Wayland")]
#[command(long_about = "
Voicetype is a hotkey-driven voice dictation tool for Wayland Linux systems.
Hold a hotkey to record, release to transcribe and type the text. Spoken
magic phrases switch translation, scenario and format modes; an optional
LLM pass refines the transcript before it reaches your cursor.

SETUP:
  1. Add yourself to the input group: sudo usermod -aG input $USER
  2. Log out and back in
  3. Install wtype and wl-clipboard
  4. Run: voicetype setup (to check dependencies and create data dirs)
  5. Run: voicetype (to start the daemon)

USAGE:
  Hold RightAlt (default) while speaking, release to transcribe.
  Text will be typed at cursor position, or copied to clipboard as fallback.
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Override the hold-to-talk key (e.g., RIGHTALT, SCROLLLOCK, F13)
    #[arg(long, value_name = "KEY")]
    hotkey: Option<String>,

    /// Override the STT language code (e.g., zh, en, auto)
    #[arg(long, value_name = "LANG")]
    language: Option<String>,

    /// Enable LLM refinement regardless of the config file
    #[arg(long)]
    refine: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Check setup and create the data directory layout
    Setup,

    /// Show current configuration
    Config,

    /// Show usage statistics (today / this week / total)
    Stats,

    /// Show daemon state (for Waybar/polybar integration)
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("voicetype={},warn", log_level))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(hotkey) = cli.hotkey {
        config.hotkey.hold = hotkey;
    }
    if let Some(language) = cli.language {
        config.stt.language = language;
    }
    if cli.refine {
        config.llm.enabled = true;
    }

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            let mut daemon = Daemon::new(config);
            daemon.run().await?;
        }

        Commands::Setup => {
            run_setup().await?;
        }

        Commands::Config => {
            show_config(&config);
        }

        Commands::Stats => {
            show_stats()?;
        }

        Commands::Status => {
            show_status(&config);
        }
    }

    Ok(())
}

/// Run the setup command
async fn run_setup() -> anyhow::Result<()> {
    println!("Voicetype Setup\n");
    println!("===============\n");

    println!("Creating directories...");
    Config::ensure_directories()?;
    println!(
        "  ✓ Config directory: {:?}",
        Config::config_dir().unwrap_or_default()
    );
    println!("  ✓ Data directory: {:?}", Config::data_dir());

    // Create default config file if it doesn't exist
    if let Some(config_path) = Config::default_path() {
        if !config_path.exists() {
            println!("\nCreating default config file...");
            std::fs::write(&config_path, config::DEFAULT_CONFIG)?;
            println!("  ✓ Created: {:?}", config_path);
        } else {
            println!("\n  Config file exists: {:?}", config_path);
        }
    }

    // Seed a persona skeleton so the soul stack has a starting point
    let soul_path = Config::soul_dir().join("soul.md");
    if !soul_path.exists() {
        std::fs::write(
            &soul_path,
            "你是一位專業的文字潤飾助理，使用繁體中文，語氣自然。\n",
        )?;
        println!("  ✓ Created persona skeleton: {:?}", soul_path);
    }

    let mut all_ok = true;

    // Check input group
    println!("\nChecking input group membership...");
    let groups_output = std::process::Command::new("groups").output()?;
    let groups_str = String::from_utf8_lossy(&groups_output.stdout);
    if groups_str.contains("input") {
        println!("  ✓ User is in 'input' group");
    } else {
        println!("  ✗ User is NOT in 'input' group");
        println!("    Run: sudo usermod -aG input $USER");
        println!("    Then log out and back in");
        all_ok = false;
    }

    // Check the tools the pipeline shells out to
    println!("\nChecking external tools...");
    for (tool, hint, required) in [
        ("wtype", "typing won't work, clipboard fallback only", false),
        ("wl-copy", "install wl-clipboard via your package manager", true),
        ("xdg-open", "assistant open/search actions won't work", false),
    ] {
        if which::which(tool).is_ok() {
            println!("  ✓ {} found", tool);
        } else {
            println!("  ✗ {} not found ({})", tool, hint);
            if required {
                all_ok = false;
            }
        }
    }

    // Check the configured backend commands
    println!("\nChecking backend commands...");
    let config = config::load_config(None)?;
    for (label, command) in [("stt", &config.stt.command), ("llm", &config.llm.command)] {
        let program = command.split_whitespace().next().unwrap_or("");
        if which::which(program).is_ok() {
            println!("  ✓ {} backend: {}", label, command);
        } else {
            println!("  ✗ {} backend command not found: {}", label, program);
            if label == "stt" {
                all_ok = false;
            }
        }
    }

    println!("\n---");
    if all_ok {
        println!("✓ All checks passed! Run 'voicetype' to start.");
    } else {
        println!("✗ Some checks failed. Please fix the issues above.");
    }

    Ok(())
}

/// Show usage statistics
fn show_stats() -> anyhow::Result<()> {
    let store = StatsStore::new(Config::stores_dir());
    let summary = store.summary()?;

    println!("Voicetype Usage\n");
    for (label, bucket) in [
        ("Today", summary.today),
        ("This week", summary.week),
        ("Total", summary.total),
    ] {
        println!(
            "{:10}  {:4} session(s)  {:7.1}s recorded  {:6} chars",
            label, bucket.sessions, bucket.duration_secs, bucket.chars
        );
    }

    Ok(())
}

/// Show the daemon state from the state file (one-shot)
fn show_status(config: &Config) {
    match config.resolve_state_file() {
        Some(path) => {
            let state = std::fs::read_to_string(&path).unwrap_or_else(|_| "stopped".to_string());
            println!("{}", state.trim());
        }
        None => {
            eprintln!("state_file is disabled in the configuration.");
            std::process::exit(1);
        }
    }
}

/// Show current configuration
fn show_config(config: &Config) {
    println!("Current Configuration\n");
    println!("=====================\n");

    println!("[hotkey]");
    println!("  hold = {:?}", config.hotkey.hold);
    println!("  toggle = {:?}", config.hotkey.toggle);
    println!("  refine = {:?}", config.hotkey.refine);
    println!("  enabled = {}", config.hotkey.enabled);

    println!("\n[audio]");
    println!("  device = {:?}", config.audio.device);
    println!("  sample_rate = {}", config.audio.sample_rate);
    println!("  max_duration_secs = {}", config.audio.max_duration_secs);

    println!("\n[stt]");
    println!("  command = {:?}", config.stt.command);
    println!("  language = {:?}", config.stt.language);
    println!("  timeout_ms = {}", config.stt.timeout_ms);

    println!("\n[llm]");
    println!("  enabled = {}", config.llm.enabled);
    println!("  mode = {:?}", config.llm.mode);
    println!("  command = {:?}", config.llm.command);
    println!("  timeout_ms = {}", config.llm.timeout_ms);
    println!("  refine_only = {}", config.llm.refine_only);

    println!("\n[assistant]");
    println!("  trigger = {:?}", config.assistant.trigger);
    println!("  enabled = {}", config.assistant.enabled);

    println!("\n[memory]");
    println!("  enabled = {}", config.memory.enabled);

    println!("\n[output]");
    println!(
        "  fallback_to_clipboard = {}",
        config.output.fallback_to_clipboard
    );

    if let Some(ref state_file) = config.state_file {
        println!("\n[integration]");
        println!("  state_file = {:?}", state_file);
        if let Some(resolved) = config.resolve_state_file() {
            println!("  (resolves to: {:?})", resolved);
        }
    }

    println!("\n---");
    println!(
        "Config file: {:?}",
        Config::default_path().unwrap_or_else(|| PathBuf::from("(not found)"))
    );
    println!("Data dir: {:?}", Config::data_dir());
}
