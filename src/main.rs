//! Payout Console - Main Entry Point
//!
//! One-shot subcommands print a JSON view and exit. `shell` keeps a single
//! console alive so edits, proposals and locks carry across commands.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use payout_console::api::{CommandError, Console};
use payout_console::constants::{self, HISTORY_DAY_OPTIONS};
use payout_console::logic::decision::{Decision, FinalDecision, HistoryFilter};
use payout_console::logic::gateway::{GatewayConfig, PayoutDecisionRequest};

/// Operator console for the payout risk workflow
#[derive(Parser, Debug)]
#[command(name = "payout-console", version)]
#[command(about = "Review payout decisions, curate conflicts and reconcile signal weights")]
struct Cli {
    /// Workflow service base URL
    #[arg(long, env = "API_BASE_URL", default_value = constants::DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Request timeout in milliseconds
    #[arg(long, env = "API_TIMEOUT_MS", default_value_t = constants::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Reviewer identity sent with review actions
    #[arg(long, env = "REVIEWER_ID", default_value = constants::DEFAULT_REVIEWER_ID)]
    reviewer_id: String,

    /// Run against the seeded in-memory service instead of the network
    #[arg(long, env = "OFFLINE", default_value = "false")]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

/// A line typed into the shell
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the workflow service is reachable
    Health,

    /// Request an automated decision for a demo payout
    Submit {
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        vpn: bool,
    },

    /// Load the decision history
    History {
        #[arg(long, value_parser = parse_decision)]
        decision: Option<Decision>,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long, default_value_t = constants::DEFAULT_HISTORY_DAYS, value_parser = parse_days)]
        days: u32,
    },

    /// Accept the system decision
    Accept { decision_id: String },

    /// Contest the system decision (a note is required)
    Conflict {
        decision_id: String,
        #[arg(long)]
        note: String,
    },

    /// Resolve a decision that was routed to review
    Resolve {
        decision_id: String,
        #[arg(value_parser = parse_final_decision)]
        final_decision: FinalDecision,
        #[arg(long)]
        note: Option<String>,
    },

    /// Why a decision was routed to review
    Why { decision_id: String },

    /// Signal weights
    Weights {
        #[command(subcommand)]
        action: Option<WeightsCommand>,
    },

    /// Conflicted decisions and the learning gate
    Conflicts {
        #[command(subcommand)]
        action: Option<ConflictsCommand>,
    },

    /// Interactive session
    Shell,
}

#[derive(Subcommand, Debug)]
enum WeightsCommand {
    /// Reload and show
    Show,
    /// Hold edits, e.g. `velocity=55 geo=20`
    Edit {
        #[arg(required = true)]
        assignments: Vec<String>,
        /// Save right away
        #[arg(long)]
        save: bool,
    },
    /// Save held edits
    Save,
    /// Apply the service's pending suggestion
    Apply,
    /// Hide the pending suggestion (local only)
    Dismiss,
    /// Apply the proposal from the last learning approval
    ApplyProposal,
    /// Close the proposal from the last learning approval
    DismissProposal,
}

#[derive(Subcommand, Debug)]
enum ConflictsCommand {
    /// Reload and list
    List,
    /// Full entry
    Show { human_review_id: String },
    /// Approve for learning
    Approve { human_review_id: String },
}

// ============================================================================
// ARGUMENT PARSERS
// ============================================================================

fn parse_decision(raw: &str) -> Result<Decision, String> {
    Decision::parse(raw).ok_or_else(|| format!("expected approve, review or block, got '{}'", raw))
}

fn parse_final_decision(raw: &str) -> Result<FinalDecision, String> {
    FinalDecision::parse(raw).ok_or_else(|| format!("expected approve or block, got '{}'", raw))
}

fn parse_days(raw: &str) -> Result<u32, String> {
    let days: u32 = raw.trim().parse().map_err(|_| format!("'{}' is not a number of days", raw))?;
    if HISTORY_DAY_OPTIONS.contains(&days) {
        Ok(days)
    } else {
        Err(format!("days must be one of {:?}", HISTORY_DAY_OPTIONS))
    }
}

/// Split a shell line on whitespace, keeping double-quoted runs together.
fn split_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_word = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

// ============================================================================
// COMMAND DISPATCH
// ============================================================================

/// One-shot actions need the record or entry they target in view first.
async fn preload(console: &Console, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Accept { .. } | Command::Conflict { .. } | Command::Resolve { .. } | Command::Why { .. } => {
            let widest = HISTORY_DAY_OPTIONS.iter().copied().max().unwrap_or(constants::DEFAULT_HISTORY_DAYS);
            console
                .load_history(Some(HistoryFilter::default().with_days(widest)))
                .await?;
        }
        Command::Weights { action } if !matches!(action, None | Some(WeightsCommand::Show)) => {
            console.load_weights().await?;
        }
        Command::Conflicts {
            action: Some(ConflictsCommand::Approve { .. } | ConflictsCommand::Show { .. }),
        } => {
            console.load_conflicted().await?;
        }
        _ => {}
    }
    Ok(())
}

async fn run(console: &Console, command: Command) -> anyhow::Result<serde_json::Value> {
    let value = match command {
        Command::Health => serde_json::to_value(console.health().await?)?,
        Command::Submit {
            user_id,
            amount,
            currency,
            country,
            vpn,
        } => {
            let mut request = PayoutDecisionRequest::default();
            if let Some(user_id) = user_id {
                request.user_id = user_id;
            }
            if let Some(amount) = amount {
                request.amount = amount;
            }
            if let Some(currency) = currency {
                request.currency = currency;
            }
            if let Some(country) = country {
                request.country = country;
            }
            request.vpn_detected = vpn;
            serde_json::to_value(console.submit_decision(&request).await?)?
        }
        Command::History { decision, user_id, days } => {
            let filter = HistoryFilter::default()
                .with_decision(decision)
                .with_user_id(user_id.as_deref())
                .with_days(days);
            serde_json::to_value(console.load_history(Some(filter)).await?)?
        }
        Command::Accept { decision_id } => serde_json::to_value(console.accept(&decision_id).await?)?,
        Command::Conflict { decision_id, note } => {
            serde_json::to_value(console.conflict(&decision_id, &note).await?)?
        }
        Command::Resolve {
            decision_id,
            final_decision,
            note,
        } => serde_json::to_value(
            console
                .resolve(&decision_id, final_decision, note.as_deref())
                .await?,
        )?,
        Command::Why { decision_id } => {
            let rationale = console.review_rationale(&decision_id).await?;
            serde_json::json!({ "decision_id": decision_id, "rationale": rationale })
        }
        Command::Weights { action } => match action.unwrap_or(WeightsCommand::Show) {
            WeightsCommand::Show => serde_json::to_value(console.load_weights().await?)?,
            WeightsCommand::Edit { assignments, save } => {
                for assignment in &assignments {
                    let (signal, raw) = assignment
                        .split_once('=')
                        .with_context(|| format!("expected signal=value, got '{}'", assignment))?;
                    console.edit_weight(signal.trim(), raw)?;
                }
                if save {
                    serde_json::to_value(console.save_weights().await?)?
                } else {
                    serde_json::to_value(console.weights_view())?
                }
            }
            WeightsCommand::Save => serde_json::to_value(console.save_weights().await?)?,
            WeightsCommand::Apply => serde_json::to_value(console.apply_suggestion().await?)?,
            WeightsCommand::Dismiss => serde_json::to_value(console.dismiss_suggestion())?,
            WeightsCommand::ApplyProposal => serde_json::to_value(console.apply_suggested().await?)?,
            WeightsCommand::DismissProposal => serde_json::to_value(console.dismiss_suggested().await?)?,
        },
        Command::Conflicts { action } => match action.unwrap_or(ConflictsCommand::List) {
            ConflictsCommand::List => serde_json::to_value(console.load_conflicted().await?)?,
            ConflictsCommand::Show { human_review_id } => {
                serde_json::to_value(console.conflict_details(&human_review_id)?)?
            }
            ConflictsCommand::Approve { human_review_id } => {
                serde_json::to_value(console.approve_for_learning(&human_review_id).await?)?
            }
        },
        Command::Shell => anyhow::bail!("already in a shell"),
    };
    Ok(value)
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<CommandError>() {
        Some(command_error) => match serde_json::to_string_pretty(command_error) {
            Ok(json) => eprintln!("{}", json),
            Err(_) => eprintln!("error: {}", command_error),
        },
        None => eprintln!("error: {:#}", err),
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn shell(console: &Console) -> anyhow::Result<()> {
    println!("{} v{} - type `help` for commands, `exit` to quit", constants::APP_NAME, constants::APP_VERSION);

    // Load every view once, as the console pages do on open
    for result in [
        console.load_history(None).await.map(|_| ()),
        console.load_weights().await.map(|_| ()),
        console.load_conflicted().await.map(|_| ()),
    ] {
        if let Err(e) = result {
            log::warn!("Initial load failed: {}", e);
        }
    }

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let words = split_line(&line);
        match words.first().map(String::as_str) {
            None => continue,
            Some("exit") | Some("quit") => break,
            _ => {}
        }

        match ShellLine::try_parse_from(words) {
            Ok(parsed) => match run(console, parsed.command).await {
                Ok(value) => print_json(&value)?,
                Err(e) => report(&e),
            },
            Err(e) => {
                // clap renders help and usage errors itself
                let _ = e.print();
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!("Starting {} v{}...", constants::APP_NAME, constants::APP_VERSION);

    let console = if cli.offline {
        Console::offline(&cli.reviewer_id)
    } else {
        let config = GatewayConfig {
            base_url: constants::normalize_base_url(Some(&cli.api_base_url)),
            timeout_ms: cli.timeout_ms,
        };
        Console::connect(config, &cli.reviewer_id).context("failed to build the workflow service client")?
    };

    if let Command::Shell = cli.command {
        return shell(&console).await;
    }

    let outcome = match preload(&console, &cli.command).await {
        Ok(()) => run(&console, cli.command).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(value) => print_json(&value),
        Err(e) => {
            report(&e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_line_keeps_quoted_notes() {
        assert_eq!(
            split_line(r#"conflict dec_1 --note "false positive, verified""#),
            vec!["conflict", "dec_1", "--note", "false positive, verified"]
        );
        assert_eq!(split_line("   "), Vec::<String>::new());
        assert_eq!(split_line(r#"resolve dec_2 block --note """#), vec!["resolve", "dec_2", "block", "--note", ""]);
    }

    #[test]
    fn test_shell_line_parses_subcommands() {
        let parsed = ShellLine::try_parse_from(["history", "--decision", "review", "--days", "14"]).unwrap();
        match parsed.command {
            Command::History { decision, days, .. } => {
                assert_eq!(decision, Some(Decision::Review));
                assert_eq!(days, 14);
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(ShellLine::try_parse_from(["history", "--days", "3"]).is_err());
        assert!(ShellLine::try_parse_from(["resolve", "dec_1", "review"]).is_err());
    }
}
