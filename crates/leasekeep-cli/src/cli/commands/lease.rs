use super::super::args::{GlobalArgs, LeaseArgs, LeaseSub, OutputFormat};
use super::super::helpers::{emit_list, open_engine, print_json, ts};
use crate::exit_codes::{DENIED, SUCCESS};
use leasekeep_core::ledger::{format_remaining, AllocationOutcome, DenyReason, ReleaseOutcome};
use leasekeep_core::model::{Lease, LeaseStatus};
use serde_json::json;

fn describe(lease: &Lease) -> String {
    let mut line = format!(
        "lease #{} resource #{} requester {} {} .. {} [{}]",
        lease.id,
        lease.resource_id,
        lease.requester_id,
        ts(lease.start),
        ts(lease.end),
        lease.status.as_str()
    );
    if lease.bonus_minutes > 0 {
        line.push_str(&format!(" +{}m bonus", lease.bonus_minutes));
    }
    line
}

fn deny_text(reason: &DenyReason) -> String {
    match reason {
        DenyReason::AlreadyLeased => "resource is already leased".to_string(),
        DenyReason::InsufficientCredit { shortfall } => {
            format!("insufficient bonus credit (short by {shortfall} minutes)")
        }
    }
}

pub(crate) fn run(args: LeaseArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let engine = open_engine(global)?;
    let ledger = engine.ledger();

    match args.cmd {
        LeaseSub::Allocate {
            resource_id,
            requester,
            hours,
            bonus_minutes,
            use_credit,
        } => {
            let hours = hours.unwrap_or(engine.config().lease.default_duration_hours);
            let outcome = if use_credit {
                ledger.allocate_with_credit(resource_id, &requester, hours, bonus_minutes)?
            } else {
                ledger.allocate(resource_id, &requester, hours, bonus_minutes)?
            };
            match (&outcome, global.format) {
                (AllocationOutcome::Granted(lease), OutputFormat::Json) => {
                    print_json(&json!({ "outcome": "granted", "lease": lease }))?
                }
                (AllocationOutcome::Granted(lease), OutputFormat::Text) => {
                    println!("granted {}", describe(lease))
                }
                (AllocationOutcome::Denied(reason), OutputFormat::Json) => {
                    print_json(&json!({ "outcome": "denied", "reason": reason }))?
                }
                (AllocationOutcome::Denied(reason), OutputFormat::Text) => {
                    println!("denied: {}", deny_text(reason))
                }
            }
            return Ok(if outcome.is_granted() { SUCCESS } else { DENIED });
        }
        LeaseSub::Active { requester } => {
            let Some(lease) = ledger.find_active_lease(&requester)? else {
                match global.format {
                    OutputFormat::Json => print_json(&json!({ "lease": null }))?,
                    OutputFormat::Text => println!("no active lease for {requester}"),
                }
                return Ok(DENIED);
            };
            // Past its end but not yet swept.
            let lapsed = lease.is_lapsed_at(ledger.now());
            match global.format {
                OutputFormat::Json => print_json(&json!({ "lease": lease, "lapsed": lapsed }))?,
                OutputFormat::Text if lapsed => {
                    println!("{} (lapsed, awaiting sweep)", describe(&lease))
                }
                OutputFormat::Text => println!("{}", describe(&lease)),
            }
        }
        LeaseSub::Remaining { requester } => {
            let Some(remaining) = ledger.remaining_time(&requester)? else {
                match global.format {
                    OutputFormat::Json => print_json(&json!({ "remaining_seconds": null }))?,
                    OutputFormat::Text => println!("no active lease for {requester}"),
                }
                return Ok(DENIED);
            };
            match global.format {
                OutputFormat::Json => print_json(&json!({
                    "remaining_seconds": remaining.num_seconds(),
                    "display": format_remaining(remaining),
                }))?,
                OutputFormat::Text => println!("{}", format_remaining(remaining)),
            }
        }
        LeaseSub::Release { lease_id } => {
            let outcome = ledger.release(lease_id, LeaseStatus::Expired)?;
            let released = outcome.was_released();
            match global.format {
                OutputFormat::Json => print_json(&json!({
                    "released": released,
                    "lease": outcome.lease(),
                }))?,
                OutputFormat::Text => match &outcome {
                    ReleaseOutcome::Released(lease) => println!("released {}", describe(lease)),
                    ReleaseOutcome::AlreadyTerminal(lease) => {
                        println!("lease #{} already ended", lease.id)
                    }
                },
            }
        }
        LeaseSub::History { requester, limit } => {
            let leases = ledger.history(&requester, limit)?;
            emit_list(
                global.format,
                &leases,
                &format!("no leases for {requester}"),
                describe,
            )?;
        }
    }
    Ok(SUCCESS)
}
