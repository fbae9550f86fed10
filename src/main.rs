use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cnops_client::{ApiClient, Transport};
use cnops_console::source::{self, Outcome, Payload};
use cnops_console::{
    ActionKind, ActionMachine, ActionRequest, ActionState, DetailKind, DetailState, Settings,
    ViewKind, ViewSession,
};
use cnops_types::{Credentials, Registration};

#[derive(Parser, Debug)]
#[command(name = "cnops")]
#[command(about = "Headless CloudNetOps console: poll views, run actions, export state")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API base URL (overrides configuration)
    #[arg(long, global = true)]
    api: Option<String>,

    /// Bearer token (overrides configuration)
    #[arg(long, global = true, env = "CNOPS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Poll interval in milliseconds (overrides configuration)
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll a view and print every applied state as one JSON line
    Watch {
        /// dashboard, instances, buckets, monitoring, advisor or cluster
        view: ViewKind,

        /// Follow the detail feed of this resource id
        #[arg(long)]
        select: Option<String>,

        /// Exit after this many poll cycles
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Run one poll cycle and write the view as pretty JSON
    Export {
        view: ViewKind,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run one action to completion, printing every transition
    Action(ActionArgs),

    /// Exchange credentials for a token and print it
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Create an account and print its token
    Register {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long, default_value = "dev")]
        role: String,
    },
}

#[derive(Args, Debug)]
struct ActionArgs {
    /// create-instance, terminate-instance, create-bucket, delete-bucket,
    /// predict or deploy
    kind: ActionKind,

    /// Instance or bucket name
    #[arg(long)]
    name: Option<String>,

    /// Instance id
    #[arg(long)]
    id: Option<String>,

    #[arg(long, default_value = "t2.micro")]
    instance_type: String,

    #[arg(long, default_value = "us-east-1")]
    region: String,

    /// Empty the bucket before deleting it
    #[arg(long)]
    force: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(&cli)?;

    match cli.command {
        Command::Watch {
            view,
            select,
            cycles,
        } => watch_view(&settings, view, select.as_deref(), cycles).await,
        Command::Export { view, output } => export_to_file(&settings, view, &output).await,
        Command::Action(args) => run_action(&settings, &args).await,
        Command::Login { email, password } => {
            let client = anonymous_client(&settings)?;
            let session = client
                .login(&Credentials { email, password })
                .await
                .context("login failed")?;
            println!("{}", session.token().unwrap_or_default());
            Ok(())
        }
        Command::Register {
            email,
            password,
            role,
        } => {
            let client = anonymous_client(&settings)?;
            let session = client
                .register(&Registration {
                    email,
                    password,
                    role,
                })
                .await
                .context("registration failed")?;
            println!("{}", session.token().unwrap_or_default());
            Ok(())
        }
    }
}

/// Load layered settings and apply command-line overrides.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    if let Some(api) = &cli.api {
        settings.api_base = api.clone();
    }
    if let Some(token) = &cli.token {
        settings.token = Some(token.clone());
    }
    if let Some(interval_ms) = cli.interval_ms {
        settings.poll_interval_ms = interval_ms;
    }
    settings.validate()?;
    Ok(settings)
}

fn transport(settings: &Settings) -> Result<Arc<dyn Transport>> {
    let client = settings.client().context("failed to build API client")?;
    Ok(Arc::new(client))
}

fn anonymous_client(settings: &Settings) -> Result<ApiClient> {
    ApiClient::builder()
        .endpoint(settings.api_base.clone())
        .timeout(settings.request_timeout())
        .build()
        .context("failed to build API client")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Print views (and detail states) until `cycles` views were printed or
/// the process is interrupted.
async fn watch_view(
    settings: &Settings,
    kind: ViewKind,
    select: Option<&str>,
    cycles: Option<u64>,
) -> Result<()> {
    let session = ViewSession::open(kind, transport(settings)?, settings.session_options())?;
    if let Some(id) = select {
        session.select(Some(id))?;
    }

    let mut views = session.subscribe();
    let mut detail = session.subscribe_detail().ok();
    let mut printed = 0u64;

    loop {
        tokio::select! {
            changed = views.changed() => {
                changed?;
                let view = views.borrow_and_update().clone();
                if view.cycle == 0 {
                    continue;
                }
                print_json(&json!({ "view": &*view }))?;
                printed += 1;
                if cycles.is_some_and(|limit| printed >= limit) {
                    break;
                }
            }
            Some(state) = next_detail(&mut detail) => {
                if state.snapshot.is_some() {
                    print_json(&json!({ "detail": state }))?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    session.close();
    Ok(())
}

async fn next_detail(rx: &mut Option<watch::Receiver<DetailState>>) -> Option<DetailState> {
    match rx {
        Some(rx) => {
            rx.changed().await.ok()?;
            let state = rx.borrow_and_update().clone();
            Some(state)
        }
        None => std::future::pending().await,
    }
}

/// Run one cycle of `kind` and write the resulting view.
async fn export_to_file(settings: &Settings, kind: ViewKind, output: &Path) -> Result<()> {
    let session = ViewSession::open(kind, transport(settings)?, settings.session_options())?;
    let mut views = session.subscribe();

    let view = loop {
        views.changed().await?;
        let view = views.borrow_and_update().clone();
        if view.cycle > 0 {
            break view;
        }
    };
    session.close();

    let json = serde_json::to_string_pretty(&*view)?;
    std::fs::write(output, json)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(view = %kind, path = %output.display(), status = ?view.overall_status, "exported view");
    Ok(())
}

async fn run_action(settings: &Settings, args: &ActionArgs) -> Result<()> {
    let transport = transport(settings)?;
    let request = build_request(transport.as_ref(), args).await?;

    let machine = ActionMachine::new(args.kind, transport, settings.revert_delay());
    let mut runs = machine.subscribe();
    if !machine.trigger(request).is_accepted() {
        bail!("{} was rejected", args.kind);
    }

    let mut outcome = machine.run();
    print_json(&outcome)?;
    loop {
        runs.changed().await?;
        let run = runs.borrow_and_update().clone();
        print_json(&run)?;
        if run.state == ActionState::Idle {
            break;
        }
        outcome = run;
    }

    match outcome.state {
        ActionState::Error => Err(anyhow!(
            "{} failed: {}",
            args.kind,
            outcome.message.unwrap_or_default()
        )),
        _ => Ok(()),
    }
}

async fn build_request(transport: &dyn Transport, args: &ActionArgs) -> Result<ActionRequest> {
    let required = |value: &Option<String>, flag: &str| {
        value
            .clone()
            .ok_or_else(|| anyhow!("--{} is required for {}", flag, args.kind))
    };

    let request = match args.kind {
        ActionKind::CreateInstance => {
            ActionRequest::create_instance(&required(&args.name, "name")?, &args.instance_type)
        }
        ActionKind::TerminateInstance => ActionRequest::terminate_instance(&required(&args.id, "id")?),
        ActionKind::CreateBucket => ActionRequest::create_bucket(&required(&args.name, "name")?, &args.region),
        ActionKind::DeleteBucket => ActionRequest::delete_bucket(&required(&args.name, "name")?, args.force),
        ActionKind::Deploy => ActionRequest::deploy(),
        ActionKind::Predict => {
            let id = required(&args.id, "id")?;
            let spec = DetailKind::InstanceMetrics.spec(&id);
            let metrics = match source::fetch(transport, &spec).await {
                Outcome::Ok(Payload::InstanceMetrics(metrics)) => metrics,
                Outcome::Ok(other) => bail!("unexpected metrics payload: {:?}", other),
                Outcome::Failed { reason, message, .. } => {
                    bail!("could not read metrics of {}: {} ({})", id, reason, message)
                }
            };
            ActionRequest::predict(&id, metrics)
        }
    };
    Ok(request)
}
