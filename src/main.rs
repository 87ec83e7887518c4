//! Binary entrypoint for the glyphbbs CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml` and sample email source documents
//! - `status` - handle, tokens, board module locks and mailbox counts
//! - `tick` - run one evaluation pass and print new deliveries
//! - `grant <TOKEN> [--reason <text>]` - grant a token and print resulting deliveries
//! - `send --to <addr> --subject <s> --body <b>` - send mail and print the reply, bounce or queue
//! - `inbox` - list the live inbox
//! - `read <ID>` - open an inbox message (first read may grant tokens)
//!
//! Every command opens a session, so `send_on_start` mail arrives on the first
//! command run against a fresh state directory.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::Path;

use glyphbbs::config::Config;
use glyphbbs::email::Email;
use glyphbbs::gating::{self, BoardModule};
use glyphbbs::session::{SendOutcome, Session};
use glyphbbs::tokens::catalogue;

const SAMPLE_INBOX: &str = include_str!("../data/seeds/emails_inbox.json");
const SAMPLE_OUTBOX: &str = include_str!("../data/seeds/emails_outbox.json");

#[derive(Parser)]
#[command(name = "glyphbbs")]
#[command(about = "Token-gated mail progression engine for the GLYPHIS_IO BBS")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and sample email sources
    Init,
    /// Show player progression status
    Status,
    /// Run one trigger evaluation pass
    Tick,
    /// Grant a token (mini-game completion, story milestone)
    Grant {
        token: String,
        /// Reason recorded in the log
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Send an email from the player
    Send {
        #[arg(long)]
        to: String,
        #[arg(short, long, default_value = "")]
        subject: String,
        #[arg(short, long, default_value = "")]
        body: String,
    },
    /// List the delivered inbox
    Inbox,
    /// Read one inbox message
    Read { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Some(Config::load(&cli.config).await?),
    };
    init_logging(&pre_config, cli.verbose);

    let Some(config) = pre_config else {
        return init(&cli.config).await;
    };

    let mut session = Session::load(config)?;
    // Every command opens with one pass; for `tick` that pass is the tick itself
    let arrived = match cli.command {
        Commands::Tick => session.tick()?,
        _ => session.evaluate()?,
    };
    print_deliveries(&arrived);

    match cli.command {
        Commands::Init | Commands::Tick => {}
        Commands::Status => print_status(&session),
        Commands::Grant { token, reason } => {
            let delivered = session.grant_token(&token, reason.as_deref())?;
            println!("Token {} held.", token.trim().to_ascii_uppercase());
            print_deliveries(&delivered);
        }
        Commands::Send { to, subject, body } => {
            let report = session.send_email(&to, &subject, &body.replace("\\n", "\n"))?;
            match report.outcome {
                SendOutcome::Replied(reply) => {
                    println!("Sent to {}. Reply received:", to);
                    print_email(&reply);
                }
                SendOutcome::Onboarded => println!("Registration received. Handle: {}", session.handle()),
                SendOutcome::Queued(_) => println!("{} is outside the network; message queued in outbox.", to),
                SendOutcome::Bounced(bounce) => print_email(&bounce),
                SendOutcome::Locked => {
                    println!("{}", gating::lock_hint(BoardModule::EmailSystem, session.handle()))
                }
            }
            print_deliveries(&report.delivered);
        }
        Commands::Inbox => {
            let inbox = session.inbox();
            if inbox.is_empty() {
                println!("Inbox empty.");
            }
            for email in inbox {
                println!(
                    "{} {:<28} {:<24} {} {}",
                    if email.read { " " } else { "*" },
                    email.id,
                    email.sender,
                    email.timestamp,
                    email.subject
                );
            }
        }
        Commands::Read { id } => {
            let report = session.read_email(&id)?;
            print_email(&report.email);
            for token in &report.granted {
                println!("Token acquired: {}", catalogue::describe(token));
            }
            print_deliveries(&report.delivered);
        }
    }
    Ok(())
}

async fn init(config_path: &str) -> Result<()> {
    info!("Initializing new glyphbbs configuration");
    if Path::new(config_path).exists() {
        return Err(anyhow!("{} already exists; refusing to overwrite", config_path));
    }
    Config::create_default(config_path).await?;
    info!("Configuration file created at {}", config_path);

    let cfg = Config::default();
    for (path, content) in [
        (cfg.inbox_path(), SAMPLE_INBOX),
        (cfg.outbox_path(), SAMPLE_OUTBOX),
    ] {
        if path.exists() {
            info!("Keeping existing {}", path.display());
            continue;
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        info!("Wrote sample source {}", path.display());
    }
    tokio::fs::create_dir_all(cfg.data_dir()).await?;
    Ok(())
}

fn print_status(session: &Session) {
    let ctx = session.context();
    println!("{}", session.config().bbs.name);
    println!("Handle: {}", session.handle());
    println!("Tokens ({}):", ctx.tokens().len());
    for token in ctx.tokens().sorted() {
        let about = catalogue::lookup(token.as_str()).map_or("", |m| m.description);
        println!("  {:<14} {}", catalogue::describe(&token), about);
    }
    println!("Modules:");
    for (module, unlocked) in session.modules() {
        println!("  {:<14} {}", module.title(), if unlocked { "open" } else { "LOCKED" });
    }
    let mb = ctx.mailbox();
    println!(
        "Mail: {} inbox ({} unread), {} sent, {} queued, {} pending",
        mb.inbox().len(),
        mb.unread_count(),
        mb.sent().len(),
        mb.outbox().len(),
        session.pending_inbox().len()
    );
}

fn print_deliveries(delivered: &[Email]) {
    for email in delivered {
        println!("New mail: [{}] {} - {}", email.id, email.sender, email.subject);
    }
}

fn print_email(email: &Email) {
    println!("From: {}", email.sender);
    println!("To: {}", email.recipient);
    println!("Date: {}", email.timestamp);
    println!("Subject: {}", email.subject);
    println!();
    for line in &email.body {
        println!("{}", line);
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins; otherwise the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Warn),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Foreground: tee to the console as well
        let is_tty = atty::is(atty::Stream::Stderr);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
