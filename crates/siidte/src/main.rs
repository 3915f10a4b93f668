#![forbid(unsafe_code)]

//! siidte CLI: re-sign, verify and inspect SII EnvioDTE envelopes.

use clap::{Parser, Subcommand};
use siidte_core::Error;
use siidte_dte::verify::report;
use siidte_dte::{
    DocumentState, Envelope, FolioPolicy, FolioPrompt, KeepFolio, LinePrompt, ResignOptions, Resigner, SystemClock,
};
use siidte_keys::{CafPool, EnvelopeCertificate};
use std::error::Error as StdError;
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "siidte",
    about = "Re-sign and verify SII electronic tax document envelopes (EnvioDTE)",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Strip every signature of an envelope and sign it again
    Resign {
        /// Input EnvioDTE file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file, written only when re-signing succeeds
        #[arg(short, long)]
        output: PathBuf,

        /// Directory searched recursively for CAF files
        #[arg(long = "caf-folder")]
        caf_folder: PathBuf,

        /// PKCS#12 bundle with the sender's certificate and key
        #[arg(long)]
        cert: PathBuf,

        /// Password of the PKCS#12 bundle
        #[arg(long = "cert-password", env = "SIIDTE_CERT_PASSWORD", hide_env_values = true)]
        cert_password: String,

        /// Keep every folio instead of asking for one per document
        #[arg(long = "non-interactive")]
        non_interactive: bool,

        /// Reject folios outside the CAF's authorized range
        #[arg(long = "strict-folio-range")]
        strict_folio_range: bool,

        /// Replace a DD's embedded CAF when it does not match the signing CAF
        #[arg(long = "replace-caf")]
        replace_caf: bool,

        /// Days between FchEmis and FchVenc
        #[arg(long = "due-days", default_value_t = siidte_dte::pipeline::DEFAULT_DUE_DAYS)]
        due_days: i64,
    },

    /// Check the TED, DTE and SetDTE signatures of an envelope
    Verify {
        /// Input EnvioDTE file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the Caratula and the documents of an envelope
    Inspect {
        /// Input EnvioDTE file
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Resign {
            input,
            output,
            caf_folder,
            cert,
            cert_password,
            non_interactive,
            strict_folio_range,
            replace_caf,
            due_days,
        } => {
            let options = ResignOptions {
                interactive: !non_interactive,
                folio_policy: if strict_folio_range { FolioPolicy::Strict } else { FolioPolicy::Lax },
                replace_dd_caf: replace_caf,
                due_days,
            };
            cmd_resign(input, output, caf_folder, cert, &cert_password, options)
        }
        Commands::Verify { input } => cmd_verify(input),
        Commands::Inspect { input } => cmd_inspect(input),
    };

    if let Err(e) = result {
        eprint!("{}", diagnostic(&e));
        debug!(error = ?e, "command failed");
        process::exit(e.exit_code());
    }
}

/// `error: <message>` followed by one `caused by:` line per source.
fn diagnostic(e: &Error) -> String {
    let mut out = format!("error: {e}\n");
    let mut source = StdError::source(e);
    while let Some(cause) = source {
        out.push_str(&format!("  caused by: {cause}\n"));
        source = cause.source();
    }
    out
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_resign(
    input: PathBuf,
    output: PathBuf,
    caf_folder: PathBuf,
    cert: PathBuf,
    cert_password: &str,
    options: ResignOptions,
) -> Result<(), Error> {
    let pool = CafPool::build(&caf_folder)?;
    info!(types = ?pool.types(), "CAF pool loaded");
    let certificate = EnvelopeCertificate::load_pfx(&cert, cert_password)?;
    info!(subject = certificate.subject(), "certificate loaded");

    let clock = SystemClock;
    let resigner = Resigner::new(&pool, &certificate, &clock, options);
    let mut prompt: Box<dyn FolioPrompt> = if options.interactive {
        Box::new(LinePrompt::stdio())
    } else {
        Box::new(KeepFolio)
    };
    let report = resigner.resign_file(&input, &output, prompt.as_mut())?;

    for doc in &report.documents {
        let r = &doc.rewrite;
        info!("{} TipoDTE={} folio {} -> {} ({:?})", r.id, r.tipo, r.old_folio, r.new_folio, doc.caf);
    }
    info!(output = %output.display(), documents = report.documents.len(), "written");
    Ok(())
}

fn cmd_verify(input: PathBuf) -> Result<(), Error> {
    let bytes = std::fs::read(&input)?;
    let envelope = Envelope::parse(&bytes)?;
    let report = report(&envelope)?;
    for doc in &report.documents {
        match doc.state {
            DocumentState::Rejected(reason) => {
                info!("{}: {reason} {}", doc.id, doc.detail.as_deref().unwrap_or_default());
            }
            state => info!("{}: {state:?}", doc.id),
        }
    }
    report.into_result()?;
    println!("OK");
    Ok(())
}

fn cmd_inspect(input: PathBuf) -> Result<(), Error> {
    let bytes = std::fs::read(&input)?;
    let envelope = Envelope::parse(&bytes)?;
    let summary = envelope.summary()?;
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_owned());

    println!("RutEmisor:   {}", show(&summary.rut_emisor));
    println!("RutEnvia:    {}", show(&summary.rut_envia));
    println!("RutReceptor: {}", show(&summary.rut_receptor));
    println!();
    for doc in &summary.documents {
        println!(
            "{:<12} {:<10} TipoDTE={:<4} Folio={:<8} FchEmis={}",
            doc.element,
            show(&doc.id),
            show(&doc.tipo),
            show(&doc.folio),
            show(&doc.fch_emis),
        );
    }
    Ok(())
}
