use clap::ArgMatches;
use clap_complete::{generate, Shell};
use dalvyze::prelude::*;
use dalvyze::{cli, dz_deodex, dz_vtables};
use std::io;

fn main() -> DzResult<()> {
    let args = cli::dalvyze().get_matches();

    match &args.subcommand() {
        Some(("vtables", cmd_args)) => dz_vtables::run(cmd_args),
        Some(("deodex", cmd_args)) => dz_deodex::run(cmd_args),
        Some(("gen-completions", sub_args)) => subcommand_gen_completions(sub_args),
        Some((subcommand, _)) => Err(DzError::BadArguments(format!(
            "unknown subcommand '{subcommand}'"
        ))),
        None => Err(DzError::BadArguments("missing subcommand".to_string())),
    }
}

fn subcommand_gen_completions(sub_args: &ArgMatches) -> DzResult<()> {
    let generator = *sub_args
        .get_one::<Shell>("shell")
        .ok_or_else(|| DzError::BadArguments("--shell needed".to_string()))?;
    let mut cmd = cli::dalvyze();
    let cmd_name = cmd.get_name().to_string();
    generate(generator, &mut cmd, cmd_name, &mut io::stdout());
    Ok(())
}
