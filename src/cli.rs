//! Main `Dalvyze` binary command line arguments options.
//!
//! This module declares a function to build `clap` command line arguments
//! parser, so that it can be used from other places than the main binary,
//! such as from bash completion file generator.

use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn arg_debug() -> Arg {
    Arg::new("debug")
        .short('d')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Activate debug mode")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Activate verbose mode")
}

fn arg_ecslog() -> Arg {
    Arg::new("ecslog")
        .short('e')
        .long("ecslog")
        .action(ArgAction::SetTrue)
        .help("Output logs in ECS format")
}

fn arg_input() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .action(ArgAction::Set)
        .required(true)
        .help("Input container")
}

fn arg_config() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .action(ArgAction::Set)
        .help("Class path configuration file (JSON)")
}

fn arg_output(help: &str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .action(ArgAction::Set)
        .help(help.to_string())
}

fn arg_filter_class() -> Arg {
    Arg::new("filter-class")
        .long("filter-class")
        .action(ArgAction::Set)
        .help("Class(es) regex filter")
}

fn arg_filter_method() -> Arg {
    Arg::new("filter-method")
        .long("filter-method")
        .action(ArgAction::Set)
        .help("Method(s) regex filter")
}

#[must_use]
pub fn dalvyze() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author(AUTHORS)
        .about(DESCRIPTION)
        .subcommand(vtables())
        .subcommand(deodex())
        .subcommand(
            Command::new("gen-completions")
                .about("Generates completions file")
                .arg(
                    Arg::new("shell")
                        .short('s')
                        .long("shell")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .help("Shell type for completion generation"),
                ),
        )
}

#[must_use]
pub fn vtables() -> Command {
    Command::new("vtables")
        .bin_name("dz-vtables")
        .version(VERSION)
        .author(AUTHORS)
        .about("Dumps the vtable of every class of a container")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_config())
        .arg(arg_output("Output text file"))
}

#[must_use]
pub fn deodex() -> Command {
    Command::new("deodex")
        .bin_name("dz-deodex")
        .version(VERSION)
        .author(AUTHORS)
        .about("Analyzes, verifies and deodexes dalvik bytecode")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_config())
        .arg(arg_output("Output container with deodexed code"))
        .arg(arg_filter_class())
        .arg(arg_filter_method())
        .arg(
            Arg::new("no-verify")
                .long("no-verify")
                .action(ArgAction::SetTrue)
                .help("Skip the verification pass"),
        )
}
