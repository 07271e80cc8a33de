//! `labplan` command-line entry point

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use labplan_context::LabConfig;
use std::path::PathBuf;

fn path_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

fn cli() -> Command {
    Command::new("labplan")
        .version(labplan_cli::VERSION)
        .about("Offline tooling for lab plan resource containers")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .subcommand(
            Command::new("apply")
                .about("Apply a resource patch to a container and print the result")
                .arg(path_arg("container", "Container JSON file"))
                .arg(path_arg("patch", "Patch JSON file"))
                .arg(
                    Arg::new("output")
                        .long("output")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the result here instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Decode a patch and reject malformed splices")
                .arg(path_arg("patch", "Patch JSON file")),
        )
        .subcommand(
            Command::new("hash")
                .about("Print a container's content hash")
                .arg(path_arg("container", "Container JSON file")),
        )
}

fn required(args: &ArgMatches, name: &str) -> Result<PathBuf> {
    args.get_one::<PathBuf>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => LabConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LabConfig::default(),
    };
    labplan_cli::init_tracing(&config.log_filter);

    match matches.subcommand() {
        Some(("apply", args)) => {
            let result = labplan_cli::apply(&required(args, "container")?, &required(args, "patch")?)?;
            let text = serde_json::to_string_pretty(&result)?;
            match args.get_one::<PathBuf>("output") {
                Some(out) => std::fs::write(out, text)
                    .with_context(|| format!("writing {}", out.display()))?,
                None => println!("{text}"),
            }
        }
        Some(("check", args)) => {
            let summary = labplan_cli::check(&required(args, "patch")?)?;
            print!("{summary}");
        }
        Some(("hash", args)) => {
            println!("{}", labplan_cli::hash(&required(args, "container")?)?);
        }
        _ => {}
    }
    Ok(())
}
