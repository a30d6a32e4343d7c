use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use labflow::{
    auth::{decode_claims, FileSession, SessionProvider, StoredSession},
    client::{AllocationApi, AllocationStatusClient},
    config::{init_tracing, load_config, ClientConfig},
    services::{parse_experiment_date, present, DateWindowEvaluator},
    view::{GateView, RequestAllocationView},
};
use serde::Serialize;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config().context("failed to load labflow configuration")?;
    init_tracing(config.log_level(), config.log_json);
    debug!(environment = %config.environment, base_url = %config.api_base_url, "configuration loaded");

    match cli.command {
        Commands::Evaluate(args) => handle_evaluate(&config, args, cli.json),
        Commands::Session(command) => handle_session_command(&config, command, cli.json),
        command => {
            let context = CliContext::initialize(&config)?;
            handle_remote_command(&context, command, cli.json).await
        }
    }
}

#[derive(Parser)]
#[command(
    name = "labflow",
    about = "Allocation window checks and allocation actions for lab requests",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the allocation window for an experiment date offline
    Evaluate(EvaluateArgs),
    /// Fetch the server-side allocation status of a request
    Status(RequestArgs),
    /// Fetch what the current user may edit on a request
    Permissions(RequestArgs),
    /// Show every experiment of a request with its allocation gate
    Request(RequestArgs),
    #[command(subcommand)]
    Override(OverrideCommands),
    /// Allocate all remaining items of experiments whose window is open
    AllocateRemaining(RequestArgs),
    #[command(subcommand)]
    Session(SessionCommands),
}

#[derive(Args)]
struct EvaluateArgs {
    #[arg(long, help = "Experiment date (YYYY-MM-DD or RFC 3339)")]
    date: String,
    #[arg(long, action = ArgAction::SetTrue, help = "Evaluate as an admin")]
    admin: bool,
    #[arg(long, value_parser = parse_day, help = "Override today's date (YYYY-MM-DD)")]
    today: Option<NaiveDate>,
}

#[derive(Args)]
struct RequestArgs {
    #[arg(help = "Request identifier")]
    request_id: String,
}

#[derive(Subcommand)]
enum OverrideCommands {
    /// Allow allocation on an experiment outside its date window
    Enable(OverrideEnableArgs),
    /// Return an experiment to its date-computed window
    Disable(OverrideDisableArgs),
}

#[derive(Args)]
struct OverrideEnableArgs {
    #[arg(help = "Request identifier")]
    request_id: String,
    #[arg(help = "Experiment identifier")]
    experiment_id: String,
    #[arg(long, help = "Why the override is needed (required)")]
    reason: String,
}

#[derive(Args)]
struct OverrideDisableArgs {
    #[arg(help = "Request identifier")]
    request_id: String,
    #[arg(help = "Experiment identifier")]
    experiment_id: String,
    #[arg(long, help = "Optional note recorded with the change")]
    reason: Option<String>,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Store an access token for later commands
    Save(SessionSaveArgs),
    /// Show the stored session and its role
    Show,
    /// Forget the stored session
    Clear,
}

#[derive(Args)]
struct SessionSaveArgs {
    #[arg(long, help = "Access token issued by the lab request API")]
    token: String,
    #[arg(long, help = "Email address to remember alongside the token")]
    email: Option<String>,
}

/// One row of the `request` listing; a bad date only fails its own row.
#[derive(Serialize)]
#[serde(untagged)]
enum GateEntry {
    Gate(GateView),
    #[serde(rename_all = "camelCase")]
    Unreadable {
        experiment_id: String,
        experiment_name: String,
        error: String,
    },
}

struct CliContext {
    session: Arc<FileSession>,
    client: Arc<AllocationStatusClient>,
    evaluator: DateWindowEvaluator,
}

impl CliContext {
    fn initialize(config: &ClientConfig) -> Result<Self> {
        let session = Arc::new(open_session(config)?);
        if session.token().is_none() {
            return Err(anyhow!(
                "no saved session; run `labflow session save --token <TOKEN>` first"
            ));
        }
        let client = AllocationStatusClient::new(config, session.clone())
            .context("failed to build API client")?;
        Ok(Self {
            session,
            client: Arc::new(client),
            evaluator: DateWindowEvaluator::default().with_grace_period(config.grace_period_days),
        })
    }

    async fn view(&self, request_id: &str) -> Result<RequestAllocationView> {
        let api: Arc<dyn AllocationApi> = self.client.clone();
        RequestAllocationView::load(api, self.evaluator.clone(), self.session.role(), request_id)
            .await
            .with_context(|| format!("failed to load request {}", request_id))
    }
}

fn open_session(config: &ClientConfig) -> Result<FileSession> {
    let path = config
        .session_path()
        .ok_or_else(|| anyhow!("cannot determine session path; set LABFLOW_HOME"))?;
    Ok(FileSession::open(path)?)
}

fn handle_evaluate(config: &ClientConfig, args: EvaluateArgs, json: bool) -> Result<()> {
    let date = parse_experiment_date(&args.date)?;
    let evaluator = match args.today {
        Some(today) => DateWindowEvaluator::fixed(today),
        None => DateWindowEvaluator::default(),
    }
    .with_grace_period(config.grace_period_days);

    let window = evaluator.evaluate(date, args.admin);
    let presentation = present(&window);
    if json {
        #[derive(Serialize)]
        struct Evaluation<'a> {
            window: &'a labflow::DateWindow,
            presentation: &'a labflow::services::Presentation,
        }
        return print_json(&Evaluation {
            window: &window,
            presentation: &presentation,
        });
    }

    println!(
        "{} • {} • {}",
        window.status,
        presentation.label,
        if window.allowed { "allocation allowed" } else { "allocation blocked" }
    );
    println!("  {}", window.message);
    Ok(())
}

async fn handle_remote_command(context: &CliContext, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Status(args) => {
            let status = context.client.get_allocation_status(&args.request_id).await?;
            if json {
                return print_json(&status);
            }
            println!(
                "Request {} • can allocate: {} • pending items: {}",
                args.request_id, status.can_allocate, status.pending_items
            );
            if let Some(reason) = &status.reason {
                println!("  {}", reason);
            }
            for exp in &status.experiment_statuses {
                println!(
                    "- {} • can allocate: {} • pending {}{}",
                    exp.experiment_name,
                    exp.can_allocate,
                    exp.pending_items,
                    if exp.has_admin_override { " • override" } else { "" }
                );
            }
            Ok(())
        }
        Commands::Permissions(args) => {
            let permissions = context.client.get_edit_permissions(&args.request_id).await?;
            if json {
                return print_json(&permissions);
            }
            println!(
                "Edit quantities: {} • disable items: {} • override dates: {} • approve: {}",
                permissions.can_edit_quantities,
                permissions.can_disable_items,
                permissions.can_override_dates,
                permissions.can_approve
            );
            Ok(())
        }
        Commands::Request(args) => {
            let view = context.view(&args.request_id).await?;
            let request = view.request();
            let entries: Vec<GateEntry> = request
                .experiments
                .iter()
                .zip(view.gate_views())
                .map(|(exp, gate)| match gate {
                    Ok(gate) => GateEntry::Gate(gate),
                    Err(err) => GateEntry::Unreadable {
                        experiment_id: exp.id.clone(),
                        experiment_name: exp.name.clone(),
                        error: err.response_message(),
                    },
                })
                .collect();
            if json {
                return print_json(&entries);
            }
            println!("Request {} as {}", args.request_id, view.role());
            for entry in &entries {
                match entry {
                    GateEntry::Gate(gate) => render_gate(gate),
                    GateEntry::Unreadable {
                        experiment_name,
                        error,
                        ..
                    } => println!("- {} • error: {}", experiment_name, error),
                }
            }
            Ok(())
        }
        Commands::Override(OverrideCommands::Enable(args)) => {
            let view = context.view(&args.request_id).await?;
            let gate = view.enable_override(&args.experiment_id, &args.reason).await?;
            if json {
                return print_json(&gate);
            }
            println!("Override enabled for experiment {}", args.experiment_id);
            Ok(())
        }
        Commands::Override(OverrideCommands::Disable(args)) => {
            let view = context.view(&args.request_id).await?;
            let gate = view
                .disable_override(&args.experiment_id, args.reason.as_deref())
                .await?;
            if json {
                return print_json(&gate);
            }
            println!(
                "Override disabled for experiment {}; actions {}",
                args.experiment_id,
                if gate.allows_actions() { "remain available" } else { "are now blocked" }
            );
            Ok(())
        }
        Commands::AllocateRemaining(args) => {
            let view = context.view(&args.request_id).await?;
            let result = view.allocate_remaining().await?;
            if json {
                return print_json(&result);
            }
            println!("{}", result.message);
            for line in &result.allocated_items {
                println!("  • {} x {}", line.quantity, line.name);
            }
            Ok(())
        }
        Commands::Evaluate(_) | Commands::Session(_) => {
            Err(anyhow!("command does not talk to the server"))
        }
    }
}

fn handle_session_command(config: &ClientConfig, command: SessionCommands, json: bool) -> Result<()> {
    let session = open_session(config)?;
    match command {
        SessionCommands::Save(args) => {
            let claims = decode_claims(&args.token).context("token is not a readable JWT")?;
            let email = args.email.or_else(|| claims.email.clone());
            session.save(StoredSession::new(args.token, email))?;
            println!(
                "Saved session for {} ({}) to {}",
                claims.email.as_deref().unwrap_or("unknown user"),
                claims.role,
                session.path().display()
            );
            Ok(())
        }
        SessionCommands::Show => {
            let Some(stored) = session.current() else {
                println!("No saved session at {}", session.path().display());
                return Ok(());
            };
            let claims = decode_claims(&stored.access_token).ok();
            if json {
                #[derive(Serialize)]
                struct SessionSummary<'a> {
                    email: Option<&'a str>,
                    role: String,
                    saved_at: String,
                    path: String,
                }
                return print_json(&SessionSummary {
                    email: stored.email.as_deref(),
                    role: session.role().to_string(),
                    saved_at: stored.saved_at.to_rfc3339(),
                    path: session.path().display().to_string(),
                });
            }
            println!(
                "{} • role {} • saved {}",
                stored.email.as_deref().unwrap_or("unknown user"),
                session.role(),
                stored.saved_at.to_rfc3339()
            );
            if claims.is_none() {
                println!("  stored token could not be decoded");
            }
            Ok(())
        }
        SessionCommands::Clear => {
            session.clear()?;
            println!("Session cleared");
            Ok(())
        }
    }
}

fn parse_day(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", raw, e))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_gate(view: &GateView) {
    println!(
        "- {} • {} • {}",
        view.experiment_name, view.presentation.label, view.window.message
    );
}
