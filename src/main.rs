use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, warn};

use kubedeck_core::app_state::{build_app_state, AppState};
use kubedeck_core::core::client::bundle::ConnectionBundle;
use kubedeck_core::core::state::runtime::live::resource_kind::ResourceKind;
use kubedeck_core::domain::dashboard::service::dashboard_feed_service::DashboardFeed;
use kubedeck_core::errors::{ConfigError, ConnectionError};
use kubedeck_core::logging::init_tracing;
use kubedeck_core::settings::Settings;

#[derive(Parser)]
#[command(
    name = "kubedeck",
    version,
    about = "Terminal dashboard for Kubernetes clusters",
    long_about = None
)]
struct Cli {
    /// Kubeconfig file (defaults to the first KUBECONFIG entry, then ~/.kube/config)
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Context to use; `-` switches back to the previous one
    #[arg(long, global = true, env = "KUBEDECK_CONTEXT")]
    context: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List contexts in the kubeconfig
    Contexts,
    /// Show the auth methods configured for a context
    Auth {
        /// Context name (defaults to the current context)
        profile: Option<String>,
    },
    /// Verify that the selected context can reach its cluster
    Check,
    /// Print resource rows, refreshing on every change
    Watch {
        /// Resource type, e.g. pods, deploy, svc
        #[arg(default_value = "pods")]
        kind: ResourceKind,

        #[arg(short, long)]
        namespace: Option<String>,

        #[arg(short = 'A', long, conflicts_with = "namespace")]
        all_namespaces: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let _guard = match init_tracing(&settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let state = build_app_state(settings);
    match run(cli, &state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "command failed");
            eprintln!("error: {e:#}");
            if let Some(hint) = hint_for(&e) {
                eprintln!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(e) = err.downcast_ref::<ConnectionError>() {
        return Some(e.hint());
    }
    err.downcast_ref::<ConfigError>().map(ConfigError::hint)
}

async fn run(cli: Cli, state: &AppState) -> Result<()> {
    let service = &state.cluster_service;
    let kubeconfig = cli.kubeconfig.unwrap_or_default();
    let requested = cli
        .context
        .or_else(|| state.settings.context.clone())
        .unwrap_or_default();

    match cli.command {
        Commands::Contexts => {
            for ctx in service.contexts(&kubeconfig)? {
                let marker = if ctx.is_current { "*" } else { " " };
                println!("{marker} {:<32} {}", ctx.name, ctx.auth_methods.join(","));
            }
        }
        Commands::Auth { profile } => {
            let profile = service.expand_profile_request(&profile.unwrap_or(requested))?;
            println!("{}", service.auth_methods(&kubeconfig, &profile)?.join("\n"));
        }
        Commands::Check => {
            let profile = service.expand_profile_request(&requested)?;
            let bundle = service.check(&kubeconfig, &profile).await?;
            println!(
                "context {} reachable at {}",
                bundle.effective_profile,
                bundle.params.server.as_deref().unwrap_or("<unknown>")
            );
        }
        Commands::Watch {
            kind,
            namespace,
            all_namespaces,
        } => {
            let profile = service.expand_profile_request(&requested)?;
            let bundle = service.connect(&kubeconfig, &profile).await?;
            let namespace = match (all_namespaces, namespace) {
                (true, _) => String::new(),
                (false, Some(ns)) => ns,
                (false, None) => bundle.namespace().to_string(),
            };
            watch(state, &bundle, kind, &namespace).await?;
        }
    }
    Ok(())
}

async fn watch(
    state: &AppState,
    bundle: &ConnectionBundle,
    kind: ResourceKind,
    namespace: &str,
) -> Result<()> {
    let feed = DashboardFeed::open(
        bundle,
        namespace,
        &[kind],
        state.settings.start_timeout,
        state.settings.poll_interval,
    )
    .await;
    let mode = if feed.is_live() { "live" } else { "polling" };
    let scope = if namespace.is_empty() { "all namespaces" } else { namespace };

    let mut changes = feed.changes(kind);
    loop {
        match feed.lines(kind).await {
            Ok(lines) => {
                println!(
                    "--- {kind} in {scope} @ {} ({mode}, {})",
                    bundle.effective_profile,
                    Utc::now().format("%H:%M:%S")
                );
                for line in lines {
                    println!("{line}");
                }
            }
            // Polling keeps going; the next tick may succeed.
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to list {kind}");
                eprintln!("warning: failed to list {kind}: {e:#}");
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            more = changes.next_change() => {
                if !more {
                    break;
                }
            }
        }
    }

    feed.close().await;
    Ok(())
}
