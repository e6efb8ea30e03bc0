// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
#[cfg(feature = "tui")]
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use donation_console::config::session_from_env;
use donation_console::export::write_transactions_csv;
use donation_console::format::format_inr;
use donation_console::{
    ActionJournal, Bucket, ConsoleConfig, HttpBackend, JournaledBackend, Session, StatementUpload,
    StatusView,
};

type ConsoleBackend = JournaledBackend<HttpBackend>;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = ConsoleConfig::from_env()?;

    match args.get(1).map(String::as_str) {
        None => {
            // The terminal belongs to the UI, so logs go to a file
            init_tracing(&config, true)?;
            run_ui_mode(&config)?;
        }
        Some("upload") => {
            init_tracing(&config, false)?;
            let Some(path) = args.get(2) else {
                print_usage();
                std::process::exit(2);
            };
            run_upload(&config, Path::new(path))?;
        }
        Some("export") => {
            init_tracing(&config, false)?;
            let (Some(bucket), Some(path)) = (args.get(2), args.get(3)) else {
                print_usage();
                std::process::exit(2);
            };
            let Some(bucket) = Bucket::parse(bucket) else {
                bail!("Unknown bucket '{bucket}' (expected default, matched or settled)");
            };
            run_export(&config, bucket, Path::new(path))?;
        }
        Some("journal") => {
            init_tracing(&config, false)?;
            let limit = match args.get(2) {
                Some(raw) => raw
                    .parse::<usize>()
                    .with_context(|| format!("Invalid journal limit '{raw}'"))?,
                None => 20,
            };
            run_journal(&config, limit)?;
        }
        Some(other) => {
            eprintln!("❌ Unknown command '{other}'");
            print_usage();
            std::process::exit(2);
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("   donation-console                          open the console");
    eprintln!("   donation-console upload <statement>       upload a bank statement");
    eprintln!("   donation-console export <bucket> <file>   export a bucket page to CSV");
    eprintln!("   donation-console journal [limit]          show recent local actions");
}

fn init_tracing(config: &ConsoleConfig, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;
        let writer: Mutex<File> = Mutex::new(file);
        if config.log_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
        }
    } else if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

fn build_backend(config: &ConsoleConfig, session: &Session) -> Result<ConsoleBackend> {
    let http = HttpBackend::new(config, session)?;
    let journal = ActionJournal::open(&config.journal_path)?;
    Ok(JournaledBackend::new(http, journal, session.staff_id))
}

fn run_upload(config: &ConsoleConfig, path: &Path) -> Result<()> {
    println!("📤 Statement Upload");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let session = session_from_env()?;
    let backend = build_backend(config, &session)?;
    let upload = StatementUpload::from_path(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    println!("\n📂 {} ({} bytes)", upload.file_name, upload.bytes.len());

    let runtime = Runtime::new()?;
    let mut view = StatusView::new(session, config.page_size, config.refetch_delay);

    println!("⏳ Uploading, then waiting {:?} for processing...", config.refetch_delay);
    let outcome = runtime.block_on(view.upload_statement(&backend, upload))?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Uploaded {}", outcome.file_name);
    println!("✓ Digest: {}", outcome.digest);
    println!(
        "✓ {} transaction(s) still need attention",
        view.rows().total_elements
    );

    Ok(())
}

fn run_export(config: &ConsoleConfig, bucket: Bucket, path: &Path) -> Result<()> {
    println!("📊 Export: {}", bucket.title());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let session = session_from_env()?;
    let backend = build_backend(config, &session)?;
    let runtime = Runtime::new()?;

    let mut view = StatusView::new(session, config.page_size, config.refetch_delay);
    runtime.block_on(view.switch_bucket(&backend, bucket))?;

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let written = write_transactions_csv(&view.rows().content, file)?;
    let total: f64 = view.rows().content.iter().map(|r| r.transaction_amount).sum();

    println!("\n✓ Wrote {} row(s) to {}", written, path.display());
    println!("✓ Page total: {}", format_inr(total));
    if view.rows().total_elements > written as u64 {
        println!(
            "⚠️  {} more row(s) on later pages (raise DONATION_PAGE_SIZE to export more)",
            view.rows().total_elements - written as u64
        );
    }

    Ok(())
}

fn run_journal(config: &ConsoleConfig, limit: usize) -> Result<()> {
    println!("📒 Recent Actions");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let journal = ActionJournal::open(&config.journal_path)?;
    let records = journal.recent(limit)?;

    if records.is_empty() {
        println!("\n(no actions recorded yet)");
        return Ok(());
    }

    println!();
    for record in &records {
        println!(
            "{}  {:<18} {:<28} staff #{}",
            record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            record.action.as_str(),
            record.subject,
            record.actor_staff_id
        );
    }
    println!("\n✓ Showing {} of {} action(s)", records.len(), journal.count()?);

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &ConsoleConfig) -> Result<()> {
    println!("🖥️  Loading Donation Console...\n");

    let session = session_from_env()?;
    let backend = Arc::new(build_backend(config, &session)?);
    let runtime = Runtime::new()?;

    println!("✓ Staff #{} ({}) against {}", session.staff_id, session.role, config.api_url);
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(backend, &runtime, session, config);
    ui::run_ui(&mut app)?;

    println!("\n✅ Console closed");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &ConsoleConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: donation-console upload | export | journal");
    std::process::exit(1);
}
