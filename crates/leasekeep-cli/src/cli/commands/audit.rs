use super::super::args::{AuditArgs, AuditSub, GlobalArgs};
use super::super::helpers::{emit_list, open_engine, ts};
use crate::exit_codes::SUCCESS;
use leasekeep_core::model::AuditEntry;

fn describe(e: &AuditEntry) -> String {
    format!(
        "{} {} [{}] {}",
        ts(e.created_at),
        e.requester_id,
        e.kind.as_str(),
        e.description
    )
}

pub(crate) fn run(args: AuditArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let engine = open_engine(global)?;
    let audit = engine.audit();

    let (entries, empty) = match args.cmd {
        AuditSub::Requester { requester, limit } => (
            audit.for_requester(&requester, limit)?,
            format!("no audit entries for {requester}"),
        ),
        AuditSub::Recent { limit } => (audit.recent(limit)?, "no audit entries".to_string()),
        AuditSub::Lease { lease_id } => (
            audit.for_lease(lease_id)?,
            format!("no audit entries for lease #{lease_id}"),
        ),
    };
    emit_list(global.format, &entries, &empty, describe)?;
    Ok(SUCCESS)
}
