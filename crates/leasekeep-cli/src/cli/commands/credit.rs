use super::super::args::{CreditArgs, CreditSub, GlobalArgs, OutputFormat};
use super::super::helpers::{emit_list, open_engine, print_json, ts};
use crate::exit_codes::{DENIED, SUCCESS};
use leasekeep_core::credits::ConsumeOutcome;
use leasekeep_core::model::BonusCredit;
use serde_json::json;

fn describe(c: &BonusCredit) -> String {
    format!(
        "credit #{} {}m ({}m left) {} [{}]",
        c.id,
        c.granted_minutes,
        c.remaining_minutes(),
        c.reason,
        ts(c.created_at)
    )
}

pub(crate) fn run(args: CreditArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let engine = open_engine(global)?;
    let credits = engine.credits();

    match args.cmd {
        CreditSub::Grant {
            requester,
            minutes,
            reason,
        } => {
            let credit = credits.grant(&requester, minutes, &reason)?;
            match global.format {
                OutputFormat::Json => print_json(&credit)?,
                OutputFormat::Text => println!("granted {}", describe(&credit)),
            }
        }
        CreditSub::Balance { requester } => {
            let minutes = credits.available_minutes(&requester)?;
            match global.format {
                OutputFormat::Json => print_json(&json!({
                    "requester_id": requester,
                    "available_minutes": minutes,
                }))?,
                OutputFormat::Text => println!("{minutes}"),
            }
        }
        CreditSub::Consume { requester, minutes } => {
            let outcome = credits.consume(&requester, minutes)?;
            match global.format {
                OutputFormat::Json => print_json(&outcome)?,
                OutputFormat::Text => match &outcome {
                    ConsumeOutcome::Consumed { minutes, .. } => {
                        println!("consumed {minutes} minutes")
                    }
                    ConsumeOutcome::InsufficientCredit {
                        available,
                        shortfall,
                        ..
                    } => println!(
                        "insufficient credit: {available} minutes available, short by {shortfall}"
                    ),
                },
            }
            if !outcome.is_consumed() {
                return Ok(DENIED);
            }
        }
        CreditSub::List { requester } => {
            let listed = credits.list(&requester)?;
            emit_list(
                global.format,
                &listed,
                &format!("no credits for {requester}"),
                describe,
            )?;
        }
    }
    Ok(SUCCESS)
}
