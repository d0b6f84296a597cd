use super::super::args::{GlobalArgs, OutputFormat, StatsArgs};
use super::super::helpers::{emit_list, open_engine, print_json, ts};
use crate::exit_codes::SUCCESS;
use leasekeep_core::stats::CategoryCount;

fn categories(counts: &[CategoryCount]) -> String {
    if counts.is_empty() {
        return "-".to_string();
    }
    counts
        .iter()
        .map(|c| format!("{} ({})", c.category, c.count))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn run(args: StatsArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let engine = open_engine(global)?;
    let stats = engine.stats();

    if args.requesters {
        let rows = stats.requesters()?;
        emit_list(global.format, &rows, "no leases yet", |r| {
            format!(
                "{}\t{} leases\tlast {}",
                r.requester_id,
                r.lease_count,
                ts(r.last_lease_start)
            )
        })?;
    } else if let Some(requester) = args.requester {
        let s = stats.requester(&requester)?;
        match global.format {
            OutputFormat::Json => print_json(&s)?,
            OutputFormat::Text => {
                println!("requester:        {}", s.requester_id);
                println!("total leases:     {}", s.total_leases);
                println!("active leases:    {}", s.active_leases);
                println!("bonus minutes:    {}", s.bonus_minutes_available);
                println!("favorites:        {}", categories(&s.favorite_categories));
            }
        }
    } else {
        let s = stats.system()?;
        match global.format {
            OutputFormat::Json => print_json(&s)?,
            OutputFormat::Text => {
                println!("resources:        {}", s.total_resources);
                println!("available:        {}", s.available_resources);
                println!("leased:           {}", s.leased_resources);
                println!("active leases:    {}", s.active_leases);
                println!("requesters:       {}", s.distinct_requesters);
                println!("top categories:   {}", categories(&s.top_categories));
                println!("ended today:      {}", s.ended_today);
                println!("requesters today: {}", s.requesters_today);
            }
        }
    }
    Ok(SUCCESS)
}
