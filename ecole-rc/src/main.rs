//! ecole-rc - operator client for affectations and payments

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ecole_common::config::{
    load_config, resolve_api_url, RootFolderInitializer, RootFolderResolver,
};
use ecole_common::ledger::LedgerForm;
use ecole_common::models::{AffectationPayload, Recouvrement};
use ecole_common::LedgerSummary;
use ecole_rc::{AuthContext, HttpBackend, Reconciler, ViewLifetime};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ecole-rc", version, about = "École reconciliation client")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true, env = "ECOLE_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding session.json
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Backend base URL (overrides ECOLE_API_URL and config)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and remember the operator
    Login {
        username: String,
        #[arg(long, env = "ECOLE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the signed-in operator
    Logout,
    /// Show the signed-in operator
    Whoami,
    /// Get or create the affectation and its recouvrement, then show the ledger
    Assign {
        #[arg(long)]
        eleve: String,
        #[arg(long)]
        classe: String,
        #[arg(long)]
        annee: String,
        /// Status code (Nouv, adm, red, Cdt, Aut)
        #[arg(long)]
        etat: Option<String>,
    },
    /// Show a recouvrement; with --set, edit fields and save them
    Ledger {
        recouvrement: i64,
        /// field=value, repeatable (e.g. --set v3=150000 --set d3=2024-11-04)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        changes: Vec<String>,
    },
    /// Record one installment
    Pay {
        recouvrement: i64,
        /// Installment number, 1 to 12
        #[arg(long)]
        slot: usize,
        #[arg(long)]
        amount: i64,
        /// Payment date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

/// Await `request` unless the operator interrupts; an interrupted result is dropped
async fn live<T, F>(view: &ViewLifetime, request: F) -> Result<T>
where
    F: Future<Output = ecole_rc::Result<T>>,
{
    let slot = view.slot();
    if !slot.run(request).await {
        bail!("Interrupted, result discarded");
    }
    match slot.take() {
        Some(result) => Ok(result?),
        None => bail!("Interrupted, result discarded"),
    }
}

fn print_summary(summary: &LedgerSummary) {
    println!("  Frais      : {}", summary.total_fee);
    println!("  Payé       : {}", summary.total_paid);
    println!("  Reste      : {}", summary.balance);
    if summary.is_overpaid() {
        println!("  Trop-perçu : {}", summary.overpayment);
    }
    println!("  Statut     : {}", summary.status.label());
}

fn print_recouvrement(rec: &Recouvrement) {
    println!(
        "Recouvrement #{} {} {}",
        rec.id,
        rec.info_eleve.as_deref().unwrap_or("-"),
        rec.info_classe.as_deref().unwrap_or("")
    );
    for (n, installment) in rec.installments.iter().enumerate() {
        if installment.amount != 0 || installment.date.is_some() {
            let date = installment
                .date
                .map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_default();
            println!("  v{:<2} {:>10} {}", n + 1, installment.amount, date);
        }
    }
    print_summary(&rec.summary());
}

fn print_form(form: &LedgerForm) {
    println!("Recouvrement #{}", form.recouvrement_id());
    print_summary(&form.summary());
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(cli.root_folder.as_deref())
        .with_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory()?;
    let mut auth = AuthContext::load(&initializer.session_path());

    let api_url = resolve_api_url(cli.api_url.as_deref(), &config);
    debug!("Backend: {}", api_url);
    let backend = HttpBackend::new(&api_url, Duration::from_secs(config.client.timeout_secs))
        .context("Failed to build HTTP client")?;
    let reconciler = Reconciler::new(backend);

    let view = ViewLifetime::new();
    let watcher = view.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted");
            watcher.close();
        }
    });

    match cli.command {
        Command::Login { username, password } => {
            let user = live(&view, reconciler.login(&username, &password)).await?;
            println!("Bienvenue {} ({})", user.fullname, user.role);
            auth.sign_in(user)?;
        }
        Command::Logout => match auth.clear()? {
            Some(user) => println!("Au revoir {}", user.fullname),
            None => println!("No operator signed in"),
        },
        Command::Whoami => {
            let user = auth.require_user()?;
            println!("{} ({}, {})", user.fullname, user.username, user.role);
            if let Some(at) = auth.signed_in_at() {
                println!("Signed in {}", at.format("%d/%m/%Y %H:%M"));
            }
        }
        Command::Assign {
            eleve,
            classe,
            annee,
            etat,
        } => {
            auth.require_user()?;
            let payload = AffectationPayload::from_text(
                Some(&eleve),
                Some(&classe),
                Some(&annee),
                etat.as_deref(),
            );
            let assignment = live(&view, reconciler.assign(&payload)).await?;
            let aff = &assignment.affectation;
            println!(
                "Affectation #{} {} {} {} [{}]",
                aff.id,
                aff.eleve_fullname.as_deref().unwrap_or("-"),
                aff.classe_nom.as_deref().unwrap_or(""),
                aff.annee_nom.as_deref().unwrap_or(""),
                aff.etat_aff.label()
            );
            print_recouvrement(&assignment.recouvrement);
        }
        Command::Ledger {
            recouvrement,
            changes,
        } => {
            auth.require_user()?;
            let mut form = live(&view, reconciler.open_ledger(recouvrement)).await?;
            for change in &changes {
                let Some((field, value)) = change.split_once('=') else {
                    bail!("Expected FIELD=VALUE, got {:?}", change);
                };
                if !form.set_field(field.trim(), value) {
                    bail!("Field {:?} cannot be edited", field);
                }
            }
            if form.is_dirty() {
                let saved = live(&view, reconciler.save_ledger(&form)).await?;
                print_form(&saved);
            } else {
                print_form(&form);
            }
        }
        Command::Pay {
            recouvrement,
            slot,
            amount,
            date,
        } => {
            auth.require_user()?;
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            let rec = live(
                &view,
                reconciler.record_payment(recouvrement, slot, amount, Some(date)),
            )
            .await?;
            print_recouvrement(&rec);
        }
    }

    Ok(())
}
