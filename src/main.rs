use anyhow::Result;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sign_stamp::config::{load_settings_config, load_user_data, StampSettings, UserData};
use sign_stamp::pdf::{add_signature_stamp, PageSelection};

/// Overlay a simple electronic signature stamp onto pages of a PDF.
#[derive(Parser, Debug)]
#[command(name = "sign_stamp")]
#[command(about = "Overlay a simple electronic signature stamp onto pages of a PDF.", long_about = None)]
struct Args {
    /// Source PDF
    input: PathBuf,

    /// Destination PDF, overwritten if it exists
    output: PathBuf,

    /// Signer name printed in the stamp
    #[arg(long)]
    name: Option<String>,

    /// Signature fingerprint printed in the stamp
    #[arg(long)]
    signature_hash: Option<String>,

    /// JSON file with `name` and `signature_hash`
    #[arg(long)]
    user_data: Option<PathBuf>,

    /// Stamp only the first page instead of every page
    #[arg(long)]
    first_page_only: bool,

    /// Zero-based index of the only page to stamp
    #[arg(short, long)]
    page: Option<usize>,

    /// settings.json with stamp layout, labels and fonts
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// TrueType font file or system font family for the stamp text
    #[arg(long)]
    font: Option<String>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "sign_stamp=info",
        1 => "sign_stamp=debug",
        _ => "sign_stamp=trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(args: Args) -> Result<()> {
    let mut settings = match &args.settings {
        Some(path) => load_settings_config(path)?,
        None => StampSettings::default(),
    };
    if let Some(font) = args.font {
        settings.font = Some(font);
    }

    let mut user = match &args.user_data {
        Some(path) => load_user_data(path)?,
        None => UserData::default(),
    };
    if let Some(name) = args.name {
        user.name = name;
    }
    if let Some(signature_hash) = args.signature_hash {
        user.signature_hash = signature_hash;
    }

    let selection = PageSelection::from_options(!args.first_page_only, args.page);
    info!("stamping {:?} ({:?})", args.input, selection);

    let report = add_signature_stamp(&args.input, &args.output, &user, selection, &settings)?;
    if report.stamped_pages.is_empty() {
        info!("no page matched the selection; {:?} is an unstamped copy", args.output);
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("Caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_page_selection() {
        let args = Args::parse_from(["sign_stamp", "in.pdf", "out.pdf", "--first-page-only", "-p", "2"]);
        assert!(args.first_page_only);
        assert_eq!(args.page, Some(2));
        assert_eq!(
            PageSelection::from_options(!args.first_page_only, args.page),
            PageSelection::Single(2)
        );

        let args = Args::parse_from(["sign_stamp", "in.pdf", "out.pdf", "--name", "Jane Doe", "-vv"]);
        assert_eq!(args.name.as_deref(), Some("Jane Doe"));
        assert_eq!(args.verbose, 2);
        assert_eq!(PageSelection::from_options(!args.first_page_only, args.page), PageSelection::All);
    }
}
