use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write as _;
use tracing::warn;

use finportal::config::PortalConfig;
use finportal::currency::format_brl;
use finportal::identity::cpf_login_email;
use finportal::loans::selection::SelectionSet;
use finportal::loans::LoanAnalysis;
use finportal::proposal::requester::ProposalRequester;
use finportal::review::ProposalReview;
use finportal::session::{AccessDecision, SessionGate};
use finportal::{AppContext, PortalError};

#[derive(Parser)]
#[command(
    name = "finportal",
    about = "Loan portal client — outstanding-loan analysis and renegotiation proposals",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Analysis/pricing service base URL
    #[arg(long, env = "FINPORTAL_API_URL")]
    api_url: Option<String>,

    /// Data directory for the session file and config.toml
    #[arg(long, env = "FINPORTAL_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FINPORTAL_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "FINPORTAL_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with a CPF. The password is read from stdin.
    ///
    /// Examples:
    ///   finportal login 123.456.789-01
    Login {
        /// CPF, with or without punctuation
        cpf: String,
    },
    /// Sign out and clear the local session.
    Logout,
    /// Show the resolved session and role.
    Whoami,
    /// List outstanding loans with balances and portfolio totals.
    Loans,
    /// Request a renegotiation proposal for a set of loans.
    ///
    /// Selects each id given via --select, aggregates the outstanding
    /// balance, requests the proposal, and opens the review. With
    /// --installments the matching option is chosen; add --share to export
    /// it to the configured composition channel.
    ///
    /// Examples:
    ///   finportal renegotiate --select 1 --select 3
    ///   finportal renegotiate --select 1 --installments 12 --share
    Renegotiate {
        /// Loan id to include (repeatable)
        #[arg(long = "select", required = true)]
        select: Vec<String>,

        /// Installment count of the option to choose
        #[arg(long)]
        installments: Option<u32>,

        /// Export the chosen option through the share channel
        #[arg(long)]
        share: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = PortalConfig::new(args.data_dir, args.api_url, args.log);
    let _log_guard = setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);

    let ctx = AppContext::new(config)?;

    match args.command {
        Command::Login { cpf } => login(&ctx, &cpf).await,
        Command::Logout => logout(&ctx).await,
        Command::Whoami => whoami(&ctx).await,
        Command::Loans => loans(&ctx).await,
        Command::Renegotiate {
            select,
            installments,
            share,
        } => renegotiate(&ctx, select, installments, share).await,
    }
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn login(ctx: &AppContext, cpf: &str) -> Result<()> {
    let email = cpf_login_email(cpf);

    print!("Password (PIM): ");
    std::io::stdout().flush()?;
    let mut password = String::new();
    std::io::stdin().read_line(&mut password)?;
    let password = password.trim_end_matches(['\r', '\n']);

    match ctx.identity.sign_in(&email, password).await {
        Ok(session) => {
            println!("Signed in as {}.", session.user_id);
            Ok(())
        }
        Err(e) => {
            println!("Sign-in failed: {e}.");
            Ok(())
        }
    }
}

async fn logout(ctx: &AppContext) -> Result<()> {
    ctx.identity.sign_out().await?;
    println!("Signed out.");
    Ok(())
}

async fn whoami(ctx: &AppContext) -> Result<()> {
    let gate = SessionGate::new(ctx.identity.clone());
    println!("Resolving session...");
    match gate.resolve_access().await {
        AccessDecision::Grant { session, role } => {
            println!("Signed in as {}.", session.user_id);
            if role.is_admin {
                println!("Role: administrator");
            }
        }
        AccessDecision::RedirectToLogin => {
            println!("Not signed in. Run `finportal login <cpf>`.");
        }
    }
    Ok(())
}

async fn loans(ctx: &AppContext) -> Result<()> {
    let gate = SessionGate::new(ctx.identity.clone());
    let mut watcher = gate.watch();

    println!("Resolving session...");
    let AccessDecision::Grant { session, .. } = gate.resolve_access().await else {
        // Protected view: nothing renders but the login entry point, and no
        // registry fetch is attempted.
        println!("Not signed in. Run `finportal login <cpf>`.");
        watcher.release();
        return Ok(());
    };

    let result = ctx.api.client_analysis(&session.user_id).await;
    watcher.release();

    let analysis = match result {
        Ok(a) => a,
        Err(e) => {
            print_portal_error(&e);
            return Ok(());
        }
    };
    print_analysis(&analysis);
    Ok(())
}

async fn renegotiate(
    ctx: &AppContext,
    select: Vec<String>,
    installments: Option<u32>,
    share: bool,
) -> Result<()> {
    let gate = SessionGate::new(ctx.identity.clone());
    let mut watcher = gate.watch();

    println!("Resolving session...");
    let AccessDecision::Grant { session, .. } = gate.resolve_access().await else {
        println!("Not signed in. Run `finportal login <cpf>`.");
        watcher.release();
        return Ok(());
    };

    // Toggles land before the registry snapshot resolves; they are preserved
    // and re-validated against it below.
    let mut selection = SelectionSet::new();
    for id in &select {
        selection.toggle(id);
    }

    let result = ctx.api.client_analysis(&session.user_id).await;
    watcher.release();
    let analysis = match result {
        Ok(a) => a,
        Err(e) => {
            print_portal_error(&e);
            return Ok(());
        }
    };

    let before = selection.selected_count();
    selection.prune(&analysis);
    if selection.selected_count() < before {
        warn!("dropped selected ids not present in the registry");
        println!("Note: some selected ids are not in your loan registry and were ignored.");
    }

    println!(
        "Selected {} loan(s) — outstanding total {}.",
        selection.selected_count(),
        format_brl(selection.total(&analysis))
    );

    let requester = ProposalRequester::new(ctx.api.clone());
    let proposal = match requester.request(&selection).await {
        Ok(p) => p,
        Err(e) => {
            print_portal_error(&e);
            return Ok(());
        }
    };

    let mut review = ProposalReview::new();
    review.open(proposal).map_err(portal_bug)?;

    // Render the options table from the state the review holds.
    if let finportal::review::ReviewState::Open { proposal } = review.state() {
        println!(
            "Proposal — balance to refinance: {}",
            format_brl(proposal.saldo_devedor_total)
        );
        if let Some(rate) = &proposal.taxa_juros_aplicada {
            println!("Rate: {rate}");
        }
        println!("Installment options:");
        for option in &proposal.opcoes_parcelamento {
            println!(
                "  {:>4}x  {}",
                option.numero_parcelas,
                format_brl(option.valor_parcela)
            );
        }
    }

    let Some(installments) = installments else {
        review.cancel();
        println!("No option chosen — re-run with --installments <n> to pick one.");
        return Ok(());
    };

    if let Err(e) = review.choose(installments) {
        print_portal_error(&e);
        review.cancel();
        return Ok(());
    }

    if share {
        match review.share(ctx.share.as_ref()) {
            Ok(()) => println!("Shared the {installments}x option."),
            Err(e) => print_portal_error(&e),
        }
    } else {
        review.cancel();
        println!("Chose the {installments}x option (not shared; pass --share to export).");
    }
    Ok(())
}

// ─── Rendering helpers ───────────────────────────────────────────────────────

fn print_analysis(analysis: &LoanAnalysis) {
    if analysis.is_empty() {
        match &analysis.message {
            Some(m) => println!("{m}"),
            None => println!("No loans found."),
        }
        return;
    }

    for loan in &analysis.emprestimos {
        let description = loan.display_description();
        println!(
            "[{}] {}",
            loan.id,
            if description.is_empty() {
                "(no description)"
            } else {
                description.as_str()
            }
        );
        println!(
            "    installments: {}/{} paid   installment: {}   next: {}",
            loan.parcelas_pagas,
            loan.quantidade_parcelas,
            format_brl(loan.valor_parcela),
            loan.next_installment()
        );
        println!(
            "    paid so far: {}   outstanding: {}",
            format_brl(loan.valor_ja_pago),
            format_brl(loan.valor_a_vencer)
        );
    }
    println!(
        "Totals — borrowed: {}   paid: {}   outstanding: {}",
        format_brl(analysis.total_emprestado),
        format_brl(analysis.total_pago),
        format_brl(analysis.total_a_vencer)
    );
}

fn print_portal_error(e: &PortalError) {
    println!("{e}");
    if e.is_fetch_failure() {
        println!("You can try again.");
    }
}

/// A transition the CLI drives in a fixed order; failing here is a bug, not
/// a user mistake.
fn portal_bug(e: PortalError) -> anyhow::Error {
    anyhow::anyhow!("unexpected review transition: {e}")
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stderr and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("finportal.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stderr-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stderr",
                dir.display()
            );
            init_plain(log_level, use_json);
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else {
        init_plain(log_level, use_json);
        None
    }
}

fn init_plain(log_level: &str, use_json: bool) {
    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
