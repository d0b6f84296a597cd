use super::args::*;

pub(crate) mod audit;
pub(crate) mod credit;
pub(crate) mod init;
pub(crate) mod lease;
pub(crate) mod notify;
pub(crate) mod resource;
pub(crate) mod stats;
pub(crate) mod sweep;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    match cli.cmd {
        Command::Init(args) => init::run(args, &global),
        Command::Resource(args) => resource::run(args, &global),
        Command::Lease(args) => lease::run(args, &global),
        Command::Credit(args) => credit::run(args, &global),
        Command::Notify(args) => notify::run(args, &global),
        Command::Audit(args) => audit::run(args, &global),
        Command::Sweep(args) => sweep::run(args, &global).await,
        Command::Stats(args) => stats::run(args, &global),
    }
}
