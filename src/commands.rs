// CRM commands run against the store from the command line

use crate::model::{BusinessStatus, NewOutreachLog, StorageError};
use crate::storage::SqliteStorage;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "prospector")]
#[command(about = "Business discovery and outreach tracking")]
pub struct Cli {
    /// Without a command the discovery daemon runs.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run discovery on the configured interval until Ctrl-C
    Run,
    /// Coverage per source and counts per status
    Stats,
    /// Businesses not contacted yet, oldest first
    Uncontacted {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Set the outreach status of a business
    Status { id: i64, status: String },
    /// Mark a business contacted and log the attempt
    Contacted {
        id: i64,
        #[arg(long)]
        email: bool,
        #[arg(long)]
        phone: bool,
        #[arg(long)]
        template: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Outreach history of a business
    Logs { id: i64 },
    /// Record whether an outreach attempt got a reply
    Response {
        log_id: i64,
        #[arg(long)]
        no: bool,
    },
    /// Delete businesses created more than `days` ago
    Cleanup { days: i64 },
}

/// Runs one store command and renders its result as text.
pub fn handle_command(command: &Command, storage: &SqliteStorage) -> Result<String, StorageError> {
    info!("Handling command: {:?}", command);
    match command {
        Command::Run => Ok(String::new()),
        Command::Stats => store_report(storage),
        Command::Uncontacted { limit } => {
            let businesses = storage.list_uncontacted(*limit)?;
            if businesses.is_empty() {
                return Ok("No uncontacted businesses.".to_string());
            }
            let lines: Vec<String> = businesses
                .iter()
                .map(|b| {
                    format!(
                        "#{} {} ({}) email: {} phone: {}",
                        b.id,
                        b.record.name,
                        b.record.location,
                        b.record.email.as_deref().unwrap_or("-"),
                        b.record.telephone.as_deref().unwrap_or("-")
                    )
                })
                .collect();
            Ok(lines.join("\n"))
        }
        Command::Status { id, status } => {
            let status: BusinessStatus = status.parse()?;
            let business = storage.update_status(*id, status)?;
            Ok(format!("#{} {} is now {}", business.id, business.record.name, business.record.status))
        }
        Command::Contacted {
            id,
            email,
            phone,
            template,
            notes,
        } => {
            let business = storage.mark_contacted(*id)?;
            let log = storage.create_outreach_log(&NewOutreachLog {
                business_id: business.id,
                email_sent: *email,
                phone_called: *phone,
                notes: notes.clone(),
                template_used: template.clone(),
            })?;
            Ok(format!("#{} {} contacted, log #{}", business.id, business.record.name, log.id))
        }
        Command::Logs { id } => {
            let business = storage.find_by_id(*id)?;
            let logs = storage.outreach_logs_for_business(business.id)?;
            let mut msg = format!("{}: {} outreach attempts", business.record.name, logs.len());
            for log in &logs {
                msg.push_str(&format!(
                    "\n#{} {} email: {} phone: {} reply: {}{}",
                    log.id,
                    log.sent_at.format("%Y-%m-%d %H:%M"),
                    log.email_sent,
                    log.phone_called,
                    log.response_received,
                    log.notes.as_deref().map(|n| format!(" ({})", n)).unwrap_or_default()
                ));
            }
            Ok(msg)
        }
        Command::Response { log_id, no } => {
            let log = storage.set_response_received(*log_id, !*no)?;
            Ok(format!("Log #{} reply received: {}", log.id, log.response_received))
        }
        Command::Cleanup { days } => {
            if *days < 1 {
                return Err(StorageError::InvalidData(format!("cleanup needs at least one day, got {}", days)));
            }
            let removed = storage.delete_older_than(*days)?;
            Ok(format!("Removed {} businesses older than {} days", removed, days))
        }
    }
}

/// Coverage per source followed by counts per status.
pub fn store_report(storage: &SqliteStorage) -> Result<String, StorageError> {
    let mut msg = String::from("Businesses by source:");
    for c in storage.stats_by_source()? {
        msg.push_str(&format!(
            "\n{}: {} (email {}, website {}, phone {})",
            c.source, c.count, c.with_email, c.with_website, c.with_phone
        ));
    }
    msg.push_str("\nBy status:");
    for (status, count) in storage.status_counts()? {
        msg.push_str(&format!("\n{}: {}", status, count));
    }
    Ok(msg)
}
