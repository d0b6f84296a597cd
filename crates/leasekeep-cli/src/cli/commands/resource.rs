use super::super::args::{GlobalArgs, OutputFormat, ResourceArgs, ResourceSub};
use super::super::helpers::{emit_list, open_engine, print_json, ts};
use crate::exit_codes::SUCCESS;
use leasekeep_core::model::Resource;

fn describe(r: &Resource) -> String {
    let state = match (&r.current_requester, r.lease_end) {
        (Some(requester), Some(end)) => format!("leased to {requester} until {}", ts(end)),
        _ if r.available => "available".to_string(),
        _ => "unavailable".to_string(),
    };
    format!("#{} [{}] {} ({state})", r.id, r.category, r.name)
}

pub(crate) fn run(args: ResourceArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let engine = open_engine(global)?;
    let inventory = engine.inventory();

    match args.cmd {
        ResourceSub::Add { category, name } => {
            let r = inventory.register(&category, &name)?;
            match global.format {
                OutputFormat::Json => print_json(&r)?,
                OutputFormat::Text => println!("registered {}", describe(&r)),
            }
        }
        ResourceSub::List { category } => {
            let found = inventory.list_available(category.as_deref())?;
            emit_list(global.format, &found, "no available resources", describe)?;
        }
        ResourceSub::Get { id } => {
            let r = inventory.get(id)?;
            match global.format {
                OutputFormat::Json => print_json(&r)?,
                OutputFormat::Text => println!("{}", describe(&r)),
            }
        }
        ResourceSub::Count { category, all } => {
            let n = if all {
                inventory.count_all()?
            } else {
                inventory.count(category.as_deref())?
            };
            match global.format {
                OutputFormat::Json => print_json(&serde_json::json!({ "count": n }))?,
                OutputFormat::Text => println!("{n}"),
            }
        }
        ResourceSub::Categories => {
            let categories = inventory.categories()?;
            emit_list(global.format, &categories, "no categories", |c| c.clone())?;
        }
        ResourceSub::Search { query } => {
            let found = inventory.search(&query)?;
            emit_list(
                global.format,
                &found,
                &format!("no available resources matching '{query}'"),
                describe,
            )?;
        }
    }
    Ok(SUCCESS)
}
