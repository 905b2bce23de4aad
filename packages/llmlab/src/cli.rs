use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use llmlab_backend_control::{BackendControl, CommandOutcome, ScriptController, SwitchTarget};
use llmlab_error::{ErrorType, LabError};
use llmlab_probe::{active_endpoint, EndpointStatus, ProbeError, ProbeOptions, Prober};
use llmlab_registry::{
    load_endpoints, load_models, ConfigOverrides, EndpointConfig, LabConfig, ModelRegistry,
    RoomDirectory,
};
use llmlab_room_reset::{
    handle_reset_request, render_room_list, AccessPolicy, Caller, Operation, ResetOutcome,
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::render::{
    render_active, render_backend, render_bench, render_endpoints, render_models,
};

const SENDER_ENV: &str = "LLMLAB_SENDER";

#[derive(Parser, Debug)]
#[command(name = "llmlab", bin_name = "llmlab")]
#[command(about = "Status and control for local LLM inference backends", version)]
#[command(arg_required_else_help = true)]
pub struct LlmlabCli {
    #[command(subcommand)]
    pub command: Command,

    /// Chat user issuing the command. Omit when running as the local operator.
    #[arg(long, global = true, env = SENDER_ENV)]
    pub sender: Option<String>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub agents_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub switch_tool: Option<PathBuf>,

    /// Extra authorized user, may be repeated.
    #[arg(long = "authorized", global = true)]
    pub authorized: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backend state, every endpoint's probe result and the active endpoint.
    Status,
    /// Probe every configured endpoint.
    Endpoints,
    /// List the model catalog, or one model by alias.
    Models(ModelsArgs),
    /// Run a short generation benchmark against the active endpoint.
    Bench(BenchArgs),
    /// Switch the GPU backend.
    Switch(SwitchArgs),
    /// Stop the GPU backend.
    Stop,
    /// List rooms whose session you may reset.
    Rooms,
    /// Reset a room's conversation session.
    Reset(ResetArgs),
}

#[derive(Args, Debug)]
pub struct ModelsArgs {
    pub alias: Option<String>,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Endpoint id to benchmark instead of the active one.
    #[arg(long)]
    pub endpoint: Option<String>,
}

#[derive(Args, Debug)]
pub struct SwitchArgs {
    /// llama-cpp or vllm
    pub target: SwitchTarget,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    pub room: Option<String>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Lab(#[from] LabError),
    #[error("probe setup failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("command did not succeed: {}", .0.title())]
    Unsuccessful(ErrorType),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Lab(err) => err.error_type().exit_code(),
            CliError::Unsuccessful(error_type) => error_type.exit_code(),
            CliError::Probe(_) | CliError::Io(_) | CliError::Json(_) => 1,
        }
    }

    fn user_message(&self) -> String {
        match self {
            CliError::Lab(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

/// What a command produced. Commands that ran but did not succeed still carry
/// output for the user plus the failure class for the exit code.
#[derive(Debug)]
pub struct CommandOutput {
    pub text: String,
    pub json: Value,
    pub failure: Option<ErrorType>,
}

impl CommandOutput {
    fn ok(text: String, json: Value) -> Self {
        Self {
            text,
            json,
            failure: None,
        }
    }
}

/// Per-invocation state: resolved paths, policy and the calling user.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: LabConfig,
    pub policy: AccessPolicy,
    pub caller: Caller,
    pub probe_options: ProbeOptions,
}

impl CommandContext {
    pub fn new(config: LabConfig, sender: Option<&str>) -> Self {
        let policy = AccessPolicy::new(config.authorized_users.iter().cloned());
        let caller = policy.classify(sender);
        Self {
            config,
            policy,
            caller,
            probe_options: ProbeOptions::default(),
        }
    }
}

pub fn run_llmlab() -> Result<(), CliError> {
    let cli = LlmlabCli::parse();
    if let Err(err) = init_logging() {
        eprintln!("failed to init logging: {err}");
        return Err(err);
    }

    let config = LabConfig::resolve(ConfigOverrides {
        config_dir: cli.config_dir.clone(),
        agents_dir: cli.agents_dir.clone(),
        switch_tool: cli.switch_tool.clone(),
        authorized_users: cli.authorized.clone(),
    });
    tracing::debug!(
        config_dir = %config.config_dir.display(),
        agents_dir = %config.agents_dir.display(),
        "resolved configuration"
    );
    let control = ScriptController::new(config.switch_tool.clone());
    let ctx = CommandContext::new(config, cli.sender.as_deref());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    match runtime.block_on(execute(&cli.command, &ctx, &control)) {
        Ok(output) => {
            if cli.json {
                write_stdout_line(&serde_json::to_string_pretty(&output.json)?)?;
            } else {
                write_stdout_line(&output.text)?;
            }
            match output.failure {
                Some(error_type) => Err(CliError::Unsuccessful(error_type)),
                None => Ok(()),
            }
        }
        Err(err) => {
            report_error(&err, cli.json)?;
            Err(err)
        }
    }
}

pub fn init_logging() -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_logfmt::builder()
                .layer()
                .with_writer(std::io::stderr),
        )
        .init();
    Ok(())
}

pub async fn execute(
    command: &Command,
    ctx: &CommandContext,
    control: &dyn BackendControl,
) -> Result<CommandOutput, CliError> {
    if let Some(operation) = gated_operation(command) {
        ctx.policy.check(&ctx.caller, operation)?;
    }

    match command {
        Command::Status => run_status(ctx, control).await,
        Command::Endpoints => run_endpoints(ctx).await,
        Command::Models(args) => run_models(ctx, args.alias.as_deref()),
        Command::Bench(args) => run_bench(ctx, args).await,
        Command::Switch(args) => {
            let outcome = control.switch(args.target).await;
            Ok(outcome_output(outcome, &format!("switched to {}", args.target)))
        }
        Command::Stop => {
            let outcome = control.stop().await;
            Ok(outcome_output(outcome, "backend stopped"))
        }
        Command::Rooms => run_rooms(ctx),
        Command::Reset(args) => run_reset(ctx, args.room.as_deref()),
    }
}

/// Room commands gate per room inside the reset flow.
fn gated_operation(command: &Command) -> Option<Operation> {
    match command {
        Command::Status => Some(Operation::Status),
        Command::Endpoints | Command::Models(_) => Some(Operation::List),
        Command::Bench(_) => Some(Operation::Benchmark),
        Command::Switch(_) => Some(Operation::Switch),
        Command::Stop => Some(Operation::Stop),
        Command::Rooms | Command::Reset(_) => None,
    }
}

async fn run_status(
    ctx: &CommandContext,
    control: &dyn BackendControl,
) -> Result<CommandOutput, CliError> {
    let prober = Prober::new(ctx.probe_options.clone())?;
    let endpoints = load_endpoints(&ctx.config.endpoints_path());
    let models = load_models(&ctx.config.models_path());

    let (backend, statuses) = tokio::join!(
        control.status(),
        probe_registry(&prober, endpoints.as_deref(), models.as_ref())
    );

    let mut sections = vec![render_backend(&backend)];
    let active = match &statuses {
        Some(statuses) => {
            let active = active_endpoint(statuses);
            sections.push(render_endpoints(statuses, active));
            sections.push(render_active(active));
            active
        }
        None => {
            sections.push("Could not load endpoint registry.".to_string());
            None
        }
    };

    let json = json!({
        "backend": backend,
        "endpoints": statuses,
        "active": active.map(|status| status.endpoint.id.clone()),
    });
    Ok(CommandOutput::ok(sections.join("\n\n"), json))
}

async fn run_endpoints(ctx: &CommandContext) -> Result<CommandOutput, CliError> {
    let prober = Prober::new(ctx.probe_options.clone())?;
    let endpoints = require_endpoints(ctx)?;
    let models = load_models(&ctx.config.models_path());
    let statuses = prober.probe_all(&endpoints, models.as_ref()).await;
    let active = active_endpoint(&statuses);

    let text = format!(
        "{}\n{}",
        render_endpoints(&statuses, active),
        render_active(active)
    );
    let json = json!({
        "endpoints": statuses,
        "active": active.map(|status| status.endpoint.id.clone()),
    });
    Ok(CommandOutput::ok(text, json))
}

fn run_models(ctx: &CommandContext, alias: Option<&str>) -> Result<CommandOutput, CliError> {
    let models = load_models(&ctx.config.models_path()).ok_or_else(|| {
        LabError::ConfigUnavailable {
            what: "model registry".to_string(),
        }
    })?;
    let models = match alias {
        Some(alias) => {
            let (key, meta) =
                models
                    .find_by_alias(alias)
                    .ok_or_else(|| LabError::InvalidRequest {
                        message: format!("unknown model alias '{alias}'"),
                    })?;
            ModelRegistry::from_entries([(key.to_string(), meta.clone())])
        }
        None => models,
    };
    let mut map = Map::new();
    for (key, meta) in models.iter() {
        map.insert(key.to_string(), serde_json::to_value(meta)?);
    }
    Ok(CommandOutput::ok(render_models(&models), Value::Object(map)))
}

async fn run_bench(ctx: &CommandContext, args: &BenchArgs) -> Result<CommandOutput, CliError> {
    let prober = Prober::new(ctx.probe_options.clone())?;
    let endpoints = require_endpoints(ctx)?;
    let models = load_models(&ctx.config.models_path());
    let statuses = prober.probe_all(&endpoints, models.as_ref()).await;

    let target = match &args.endpoint {
        Some(id) => statuses
            .iter()
            .find(|status| &status.endpoint.id == id)
            .ok_or_else(|| LabError::InvalidRequest {
                message: format!("no endpoint with id '{id}'"),
            })?,
        None => active_endpoint(&statuses).ok_or_else(|| LabError::BackendUnavailable {
            message: "no endpoint is online".to_string(),
        })?,
    };
    if !target.result.is_online() {
        return Err(LabError::BackendUnavailable {
            message: format!("{} is offline", target.endpoint.name),
        }
        .into());
    }
    let model = target
        .result
        .model_path()
        .ok_or_else(|| LabError::BackendUnavailable {
            message: format!("no model is loaded on {}", target.endpoint.name),
        })?;

    tracing::info!(endpoint = %target.endpoint.id, model, "running benchmark");
    let bench = prober
        .benchmark(&target.endpoint, model)
        .await
        .map_err(|err| bench_error(err, &target.endpoint))?;

    let json = json!({
        "endpoint": target.endpoint.id,
        "model": target.result.model(),
        "result": bench,
    });
    Ok(CommandOutput::ok(render_bench(target, &bench), json))
}

fn bench_error(err: ProbeError, endpoint: &EndpointConfig) -> LabError {
    match err {
        ProbeError::Timeout(timeout) => LabError::Timeout {
            operation: "benchmark".to_string(),
            seconds: timeout.as_secs(),
        },
        other => LabError::BackendUnavailable {
            message: format!("benchmark on {} failed: {other}", endpoint.name),
        },
    }
}

fn run_rooms(ctx: &CommandContext) -> Result<CommandOutput, CliError> {
    let rooms = RoomDirectory::open(ctx.config.rooms_path());
    if !rooms.is_available() {
        return Err(LabError::ConfigUnavailable {
            what: "room configuration".to_string(),
        }
        .into());
    }
    let names: Vec<String> = ctx
        .policy
        .visible_rooms(&ctx.caller, &rooms)
        .into_iter()
        .map(str::to_string)
        .collect();
    let text = render_room_list(&names);
    Ok(CommandOutput::ok(text, json!({ "rooms": names })))
}

fn run_reset(ctx: &CommandContext, room: Option<&str>) -> Result<CommandOutput, CliError> {
    let rooms = RoomDirectory::open(ctx.config.rooms_path());
    let outcome = handle_reset_request(
        &rooms,
        &ctx.policy,
        &ctx.caller,
        &ctx.config.agents_dir,
        room,
    );
    let failure = match &outcome {
        ResetOutcome::Rejected { .. } => Some(ErrorType::PermissionDenied),
        ResetOutcome::RoomsUnavailable => Some(ErrorType::ConfigUnavailable),
        ResetOutcome::Failed { error, .. } => Some(error.error_type()),
        ResetOutcome::ListRooms {
            requested: Some(_), ..
        } => Some(ErrorType::RoomNotFound),
        ResetOutcome::ListRooms { requested: None, .. }
        | ResetOutcome::AlreadyFresh { .. }
        | ResetOutcome::Reset { .. } => None,
    };
    Ok(CommandOutput {
        text: outcome.message(),
        json: serde_json::to_value(&outcome)?,
        failure,
    })
}

async fn probe_registry(
    prober: &Prober,
    endpoints: Option<&[EndpointConfig]>,
    models: Option<&ModelRegistry>,
) -> Option<Vec<EndpointStatus>> {
    match endpoints {
        Some(endpoints) => Some(prober.probe_all(endpoints, models).await),
        None => None,
    }
}

fn require_endpoints(ctx: &CommandContext) -> Result<Vec<EndpointConfig>, LabError> {
    load_endpoints(&ctx.config.endpoints_path()).ok_or_else(|| LabError::ConfigUnavailable {
        what: "endpoint registry".to_string(),
    })
}

fn outcome_output(outcome: CommandOutcome, fallback: &str) -> CommandOutput {
    let text = if outcome.output.trim().is_empty() {
        fallback.to_string()
    } else {
        outcome.output.clone()
    };
    CommandOutput {
        failure: (!outcome.success).then_some(ErrorType::CommandFailed),
        json: json!({ "success": outcome.success, "output": outcome.output }),
        text,
    }
}

fn report_error(err: &CliError, json: bool) -> Result<(), CliError> {
    match (err, json) {
        (CliError::Lab(lab), true) => {
            write_stdout_line(&serde_json::to_string_pretty(&lab.to_report())?)
        }
        _ => write_stderr_line(&err.user_message()),
    }
}

fn write_stdout_line(text: &str) -> Result<(), CliError> {
    let mut out = std::io::stdout();
    out.write_all(text.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn write_stderr_line(text: &str) -> Result<(), CliError> {
    let mut out = std::io::stderr();
    out.write_all(text.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}
