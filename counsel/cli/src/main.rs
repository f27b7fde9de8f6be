//! Counsel CLI - Terminal Client for the Legal Assistant Backend
//!
//! Drives a [`Session`] from the command line and prints every update as it
//! is applied.
//!
//! # Usage
//!
//! ```bash
//! # Follow a workflow's live channel (and the notification channel)
//! counsel watch wf-42 --notifications
//!
//! # Ask a question; falls back to a simulated analysis if the backend fails
//! counsel ask "Is the landlord liable for the slip?" --case case-17
//!
//! # Create and run a workflow, then follow it
//! counsel run "Was the contract breached?" --case case-9 --mode debate
//!
//! # Print a finished debate's transcript
//! counsel history wf-42
//!
//! # Replay a scripted workflow without a backend
//! counsel simulate "texting while walking" --mode debate
//!
//! # Verbose logging
//! RUST_LOG=debug counsel watch wf-42
//! ```
//!
//! Ctrl-C stops any command; `ask`, `run` without a channel, and `simulate`
//! also stop on their own once the reply or simulation is finished.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use counsel_core::{
    default_config_path, load_config_from_path, AskOnceOutcome, AskOutcome, ConfigOverrides,
    ConnectionState, CreateWorkflow, DispatchOutcome, FinishReason, OutboundMessage, Session,
    SessionUpdate, SimulationMode,
};

/// Counsel - terminal client for the legal assistant backend
#[derive(Parser, Debug)]
#[command(name = "counsel")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "COUNSEL_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Backend host for the live channels (`host:port`)
    #[arg(long, value_name = "HOST", global = true)]
    host: Option<String>,

    /// Backend base URL for the HTTP endpoints
    #[arg(long, value_name = "URL", global = true)]
    api_url: Option<String>,

    /// Simulation mode used when a request falls back
    #[arg(long, value_name = "MODE", global = true)]
    fallback_mode: Option<SimulationMode>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "COUNSEL_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow a workflow's live channel until interrupted
    Watch {
        /// Workflow identifier
        workflow_id: String,

        /// Also follow the notification channel
        #[arg(short, long)]
        notifications: bool,

        /// Request a status snapshot each time the channel opens
        #[arg(long)]
        status: bool,
    },

    /// Ask a question and print the reply as it streams
    Ask {
        /// The question
        message: String,

        /// Case the question is about
        #[arg(long, value_name = "ID")]
        case: Option<String>,

        /// Use the non-streaming endpoint
        #[arg(long)]
        once: bool,
    },

    /// Create a workflow, start it and follow its channel
    Run {
        /// Legal issue to analyze
        issue: String,

        /// Case identifier
        #[arg(long, value_name = "ID")]
        case: String,

        /// Single analysis or debate
        #[arg(short, long, default_value = "single")]
        mode: SimulationMode,

        /// Jurisdiction
        #[arg(long)]
        jurisdiction: Option<String>,
    },

    /// Print the transcript of a debate workflow
    History {
        /// Workflow identifier
        workflow_id: String,
    },

    /// Replay a scripted workflow without contacting the backend
    Simulate {
        /// Text used to pick the scenario
        input: String,

        /// Single analysis or debate
        #[arg(short, long, default_value = "single")]
        mode: SimulationMode,
    },
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("counsel_cli={level},counsel_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config =
        load_config_from_path(config_path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    overrides.host = args.host;
    overrides.api_url = args.api_url;
    overrides.fallback_mode = args.fallback_mode;
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(source = %config.source(), host = %config.transport.host, "Configuration loaded");

    let mut session = Session::new(config).context("Failed to create session")?;
    let result = run(&mut session, args.command).await;
    session.shutdown().await;
    result
}

async fn run(session: &mut Session, command: Command) -> Result<()> {
    match command {
        Command::Watch {
            workflow_id,
            notifications,
            status,
        } => {
            let channel = session.open_workflow_channel(&workflow_id)?;
            if notifications {
                session.open_notification_channel()?;
            }
            pump(session, |session, update| {
                if let SessionUpdate::Connectivity {
                    channel: c,
                    state: ConnectionState::Open,
                } = update
                {
                    if status && *c == channel {
                        session.send(channel, &OutboundMessage::GetStatus);
                    }
                }
            })
            .await
        }

        Command::Ask {
            message,
            case,
            once,
        } => {
            session.set_case(case);
            if once {
                match session.ask_once(&message).await {
                    AskOnceOutcome::Answered(response) => println!("{}", response.response),
                    AskOnceOutcome::Simulated(handle) => {
                        println!("Backend unavailable, showing a simulated analysis ({handle})");
                    }
                }
            } else if let AskOutcome::Simulated(handle) = session.ask(&message).await {
                println!("Backend unavailable, showing a simulated analysis ({handle})");
            }
            pump(session, |_, _| {}).await
        }

        Command::Run {
            issue,
            case,
            mode,
            jurisdiction,
        } => {
            let request = CreateWorkflow {
                mode,
                case_id: case,
                issue_text: issue.clone(),
                lawyer_id: None,
                jurisdiction,
                model: None,
            };

            match session.workflows().create(&request).await {
                Ok(workflow) => {
                    println!("Workflow {} ({})", workflow.workflow_id, workflow.status);
                    session.open_workflow_channel(&workflow.workflow_id)?;
                    session
                        .workflows()
                        .execute(&workflow.workflow_id, true)
                        .await
                        .context("Failed to start workflow")?;
                }
                Err(e) => {
                    warn!(error = %e, "Workflow creation failed, falling back to simulation");
                    println!("Backend unavailable, showing a simulated {mode} workflow");
                    session.simulate(mode, &issue);
                }
            }
            pump(session, |_, _| {}).await
        }

        Command::History { workflow_id } => {
            let history = session
                .workflows()
                .debate_history(&workflow_id)
                .await
                .context("Failed to fetch debate history")?;
            println!(
                "Debate {} ({}, {} turns)",
                history.debate_id, history.status, history.turns
            );
            for message in &history.messages {
                println!("{}", serde_json::to_string(message)?);
            }
            Ok(())
        }

        Command::Simulate { input, mode } => {
            let handle = session.simulate(mode, &input);
            println!("Simulating {mode} workflow ({handle})");
            pump(session, |_, _| {}).await
        }
    }
}

/// Print updates until nothing is live or Ctrl-C
async fn pump(
    session: &mut Session,
    mut on_update: impl FnMut(&mut Session, &SessionUpdate),
) -> Result<()> {
    let mut printer = Printer::default();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted");
                break;
            }
            update = session.next_update() => match update {
                Some(update) => {
                    printer.print(session, &update)?;
                    on_update(session, &update);
                }
                None => break,
            }
        }
    }

    Ok(())
}

/// Renders updates to stdout
#[derive(Default)]
struct Printer {
    /// Bytes of the current reply already written
    written: usize,
}

impl Printer {
    fn print(&mut self, session: &Session, update: &SessionUpdate) -> Result<()> {
        let mut out = std::io::stdout().lock();

        match update {
            SessionUpdate::Connectivity { channel, state } => {
                writeln!(out, "[{channel}] {state}")?;
            }
            SessionUpdate::ReconnectScheduled {
                channel,
                attempt,
                delay,
            } => {
                writeln!(
                    out,
                    "[{channel}] reconnecting in {} ms (attempt {attempt})",
                    delay.as_millis()
                )?;
            }
            SessionUpdate::Routed { origin, outcome } => match outcome {
                DispatchOutcome::Routed { seq, tag } => {
                    let entry = session
                        .log()
                        .iter()
                        .rev()
                        .find(|r| r.seq == *seq)
                        .map(|r| serde_json::to_string(&r.entry))
                        .transpose()?
                        .unwrap_or_default();
                    writeln!(out, "[{origin}] #{seq} {tag} {entry}")?;
                }
                DispatchOutcome::Unrecognized { seq, tag } => {
                    writeln!(
                        out,
                        "[{origin}] #{seq} unrecognized message ({})",
                        tag.as_deref().unwrap_or("no type")
                    )?;
                }
                DispatchOutcome::Rejected => {
                    writeln!(out, "[{origin}] malformed message discarded")?;
                }
            },
            SessionUpdate::ReplyDelta { accumulated, .. } => {
                if let Some(fresh) = accumulated.get(self.written..) {
                    write!(out, "{fresh}")?;
                }
                self.written = accumulated.len();
            }
            SessionUpdate::ReplyAnalysis { reply, payload } => {
                writeln!(out)?;
                writeln!(out, "[{reply}] analysis {payload}")?;
            }
            SessionUpdate::ReplyFinished { reply, reason, .. } => {
                self.written = 0;
                writeln!(out)?;
                if *reason == FinishReason::StreamClosed {
                    writeln!(out, "[{reply}] reply ended before completion")?;
                }
            }
            SessionUpdate::SimulationFinished { simulation } => {
                writeln!(out, "[{simulation}] simulation finished")?;
            }
        }

        out.flush()?;
        Ok(())
    }
}
