//! Command-line interface and report output

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use crate::bootstrap::{BootstrapPlan, BootstrapReport, StepStatus, VerifyReport};

/// Provision the Budget Tracker database: user, collections, indexes and seed data
///
/// Connection and credentials come from the environment (or a .env file):
/// MONGODB_URI, APP_DB_USER, APP_DB_PASSWORD, BOOTSTRAP_DATABASE, BOOTSTRAP_TIMEOUT_SECS.
#[derive(Debug, Parser)]
#[command(name = "budget-bootstrap", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Print output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create the user, collections, indexes and welcome notification (default)
    Apply,
    /// Check that everything is in place without changing anything
    Verify,
    /// Print the steps that `apply` would run, without connecting
    Plan,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Apply)
    }

    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error formatting JSON: {}", e),
    }
}

pub fn print_plan(plan: &BootstrapPlan, format: OutputFormat) {
    let steps = plan.steps();
    match format {
        OutputFormat::Json => print_json(&json!({
            "database": plan.database,
            "username": plan.user.username,
            "steps": steps,
        })),
        OutputFormat::Text => {
            println!("Bootstrap plan for '{}'", plan.database);
            for (i, step) in steps.iter().enumerate() {
                println!("  {}. {}", i + 1, step);
            }
        }
    }
}

pub fn print_report(report: &BootstrapReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Text => {
            println!("Bootstrap of '{}'", report.database);
            for record in &report.steps {
                let status = match record.status {
                    StepStatus::Applied => "applied",
                    StepStatus::Skipped => "skipped",
                };
                match &record.reason {
                    Some(reason) => println!("  {:<8} {} ({})", status, record.step, reason),
                    None => println!("  {:<8} {}", status, record.step),
                }
            }
            println!(
                "{} applied, {} skipped",
                report.applied(),
                report.skipped()
            );
        }
    }
}

pub fn print_verify(report: &VerifyReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Text => {
            if report.is_complete() {
                println!("Database '{}' is fully bootstrapped", report.database);
            } else {
                println!("Database '{}' is missing:", report.database);
                for item in &report.missing {
                    println!("  - {}", item);
                }
            }
        }
    }
}
