use clap::{arg, crate_version, Arg, ArgAction, Command};
use rolzip::block;
use std::fs::File;
use std::io::{self, Read, Write};
use std::process::ExitCode;

const RCH: &str = "unreachable was reached";

fn open_source(path: Option<&String>) -> io::Result<Box<dyn Read>> {
    match path {
        Some(p) => Ok(Box::new(File::open(p)?)),
        None => Ok(Box::new(io::stdin())),
    }
}

fn open_target(path: Option<&String>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(p) => Ok(Box::new(File::create(p)?)),
        None => Ok(Box::new(io::stdout())),
    }
}

fn run() -> Result<(), rolzip::DYNERR> {
    let long_help = "Examples:
---------
Compress:      `rolzip e my_file my_file.rz`
Expand:        `rolzip d my_file.rz my_file`
Pipe:          `rolzip e < my_file > my_file.rz`";

    let mut main_cmd = Command::new("rolzip")
        .about("Compress and expand with a ROLZ matcher and a Polar prefix coder")
        .after_long_help(long_help)
        .version(crate_version!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("increase logging verbosity")
                .action(ArgAction::Count)
                .global(true),
        );
    main_cmd = main_cmd.subcommand(
        Command::new("e")
            .about("compress a file, or stdin if source is omitted")
            .arg(arg!([source] "input path"))
            .arg(arg!([target] "output path")),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("d")
            .about("expand a file, or stdin if source is omitted")
            .arg(arg!([source] "input path"))
            .arg(arg!([target] "output path")),
    );

    let matches = main_cmd.get_matches();

    let verbosity = matches.get_count("verbose");
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Some(cmd) = matches.subcommand_matches("e") {
        let mut source = open_source(cmd.get_one::<String>("source"))?;
        let mut target = open_target(cmd.get_one::<String>("target"))?;
        let (ilen, olen) = block::compress(&mut source, &mut target)?;
        log::info!("compressed {} bytes into {} bytes", ilen, olen);
        return Ok(());
    }

    if let Some(cmd) = matches.subcommand_matches("d") {
        let mut source = open_source(cmd.get_one::<String>("source"))?;
        let mut target = open_target(cmd.get_one::<String>("target"))?;
        let (ilen, olen) = block::expand(&mut source, &mut target)?;
        log::info!("expanded {} bytes into {} bytes", ilen, olen);
        return Ok(());
    }

    Err(RCH.into())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rolzip: {e}");
            ExitCode::FAILURE
        }
    }
}
