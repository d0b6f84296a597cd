use super::super::args::{GlobalArgs, NotifyArgs, NotifySub, OutputFormat};
use super::super::helpers::{emit_list, open_engine, print_json, ts};
use crate::exit_codes::SUCCESS;
use leasekeep_core::model::Notification;

fn describe(n: &Notification) -> String {
    let mut line = format!(
        "#{} [{}] {}{} {}",
        n.id,
        n.kind.as_str(),
        ts(n.created_at),
        if n.read { "" } else { " (unread)" },
        n.body
    );
    if let Some(at) = n.rotate_after {
        line.push_str(&format!(" rotate after {}", ts(at)));
    }
    line
}

pub(crate) fn run(args: NotifyArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let engine = open_engine(global)?;
    let outbox = engine.outbox();

    match args.cmd {
        NotifySub::List {
            requester,
            unread,
            limit,
        } => {
            let notes = if unread {
                outbox.unread(&requester)?
            } else {
                outbox.recent(&requester, limit)?
            };
            emit_list(
                global.format,
                &notes,
                &format!("no notifications for {requester}"),
                describe,
            )?;
        }
        NotifySub::Read { id } => {
            outbox.mark_read(id)?;
            match global.format {
                OutputFormat::Json => print_json(&serde_json::json!({ "id": id, "read": true }))?,
                OutputFormat::Text => println!("notification #{id} marked read"),
            }
        }
        NotifySub::Lapsed { after, limit } => {
            let feed = outbox.lapsed_after(after, limit)?;
            emit_list(global.format, &feed, "no lapse notifications", describe)?;
        }
    }
    Ok(SUCCESS)
}
