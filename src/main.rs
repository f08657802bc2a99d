//! CLI entry point for `msgpeek`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};

use msgpeek::cfb::{self, CompoundFile};
use msgpeek::config::{self, Config};
use msgpeek::{ByteWindow, MsgError, MsgReader, ParsedMessage, RecipientType};

#[derive(Parser)]
#[command(
    name = "msgpeek",
    version,
    about = "Read Outlook .msg/.oft files and RFC 5322 messages"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the subject, recipients and body of a message
    Show {
        path: PathBuf,
        /// Print the parsed message as JSON
        #[arg(long)]
        json: bool,
        /// Print the HTML body instead of the plain-text body
        #[arg(long)]
        html: bool,
        /// Start of the message within the file
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Length of the message within the file (default: to end of file)
        #[arg(long)]
        length: Option<usize>,
    },
    /// List the compound file header and directory entries
    Inspect {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Show {
            path,
            json,
            html,
            offset,
            length,
        } => {
            let json = json || config.output.format == "json";
            cmd_show(&path, &config, json, html, offset, length)
        }
        Commands::Inspect { path, json } => cmd_inspect(&path, json),
        Commands::Config { init } => cmd_config(&config, init),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "msgpeek.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// File contents, memory-mapped when non-empty.
enum Input {
    Mapped(memmap2::Mmap),
    Empty,
}

impl Input {
    fn open(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Err(MsgError::FileNotFound(path.to_path_buf()).into());
        }
        let file = std::fs::File::open(path).map_err(|e| MsgError::io(path, e))?;
        if file.metadata().map_err(|e| MsgError::io(path, e))?.len() == 0 {
            return Ok(Self::Empty);
        }
        // SAFETY: the map is read-only and lives only for this command.
        let mmap = unsafe {
            memmap2::Mmap::map(&file)
                .with_context(|| format!("Failed to mmap {}", path.display()))?
        };
        Ok(Self::Mapped(mmap))
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => &mmap[..],
            Self::Empty => &[],
        }
    }
}

fn cmd_show(
    path: &Path,
    config: &Config,
    json: bool,
    html: bool,
    offset: usize,
    length: Option<usize>,
) -> anyhow::Result<()> {
    let input = Input::open(path)?;
    let bytes = input.bytes();
    let length = length.unwrap_or_else(|| bytes.len().saturating_sub(offset));

    let reader = MsgReader::new(config.reader.to_options()?);
    let message = reader.read_range(bytes, offset, length)?;
    tracing::info!(
        path = %path.display(),
        source = message.source.as_str(),
        recipients = message.recipients.len(),
        "Read message"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        print_message(&message, html, config.output.body_preview_chars);
    }
    Ok(())
}

/// Print a message as a human-readable report.
fn print_message(message: &ParsedMessage, html: bool, preview_chars: usize) {
    println!();
    println!("  {:<10} {}", "Source", message.source.as_str());
    if let Some(ref subject) = message.subject {
        println!("  {:<10} {subject}", "Subject");
    }
    if let Some(ref sender) = message.sender {
        println!("  {:<10} {sender}", "From");
    }
    if let Some(date) = message.date {
        println!("  {:<10} {}", "Date", date.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    for kind in [RecipientType::To, RecipientType::Cc, RecipientType::Bcc] {
        let list: Vec<String> = message.recipients_of(kind).map(|r| r.display()).collect();
        if !list.is_empty() {
            println!("  {:<10} {}", kind.header_name(), list.join(", "));
        }
    }
    if message.body_rtf.is_some() {
        println!("  {:<10} present", "RTF");
    }

    let body = if html {
        message.body_html.as_deref()
    } else {
        message.body.as_deref()
    };
    if let Some(body) = body {
        println!();
        if preview_chars > 0 && body.chars().count() > preview_chars {
            let cut: String = body.chars().take(preview_chars).collect();
            println!("{cut}…");
        } else {
            println!("{body}");
        }
    }
    println!();
}

/// List the structure of a compound file.
fn cmd_inspect(path: &Path, json: bool) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let input = Input::open(path)?;
    let window = ByteWindow::new(input.bytes());
    if !cfb::is_cfb(&window) {
        anyhow::bail!("{} is not a compound file", path.display());
    }
    let file = CompoundFile::open(window, cfb::CfbOptions::default())?;

    if json {
        let entries: Vec<serde_json::Value> = file
            .entries()
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "entry": entry,
                    "parent": file.parent(entry.id),
                })
            })
            .collect();
        let report = serde_json::json!({
            "file": path.to_string_lossy(),
            "file_size": window.len(),
            "header": file.header(),
            "entries": entries,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let header = file.header();
    println!();
    println!("  {:<20} {}", "File", path.display());
    println!("  {:<20} {}", "File size", format_size(window.len(), BINARY));
    println!("  {:<20} {}", "Sector size", header.sector_size());
    println!("  {:<20} {}", "Mini-sector size", header.mini_sector_size());
    println!("  {:<20} {}", "FAT sectors", header.num_fat_sectors);
    println!("  {:<20} {}", "DIF sectors", header.num_dif_sectors);
    println!("  {:<20} {}", "Directory entries", file.entries().len());
    println!();
    println!(
        "  {:>5}  {:>6}  {:<10} {:>10}  {:>10}  NAME",
        "ID", "PARENT", "TYPE", "START", "SIZE"
    );
    for entry in file.entries() {
        if entry.entry_type == cfb::EntryType::Unallocated {
            continue;
        }
        let parent = file
            .parent(entry.id)
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "  {:>5}  {:>6}  {:<10} {:>10}  {:>10}  {}",
            entry.id,
            parent,
            format!("{:?}", entry.entry_type),
            entry.start_sector,
            format_size(entry.size, BINARY),
            entry.name
        );
    }
    println!();
    Ok(())
}

/// Print the effective config, or write the defaults with `--init`.
fn cmd_config(config: &Config, init: bool) -> anyhow::Result<()> {
    if init {
        let path = config::save_config(&Config::default())?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    if let Some(path) = config::config_file_path() {
        println!("# {}", path.display());
    }
    println!("# log: {}", config::log_file_path(config).display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "msgpeek", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
