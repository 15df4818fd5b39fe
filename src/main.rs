//! # Command Line Interface
//!
//! Dispatch commands to `commands` module.

use env_logger;
#[cfg(windows)]
use colored;
use dfkit::commands;
use dfkit::commands::CommandError;
mod cli;

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).unwrap();

    let main_cmd = cli::build_cli();
    let matches = main_cmd.get_matches();

    // Completions

    if let Some(cmd) = matches.subcommand_matches("completions") {
        return commands::completions::generate(cli::build_cli(),cmd);
    }

    // Identify the partition scheme and list partitions

    if let Some(cmd) = matches.subcommand_matches("scan") {
        return commands::scan::scan(cmd);
    }

    // Print loopback mount plans

    if let Some(cmd) = matches.subcommand_matches("mount") {
        return commands::scan::mount(cmd);
    }

    // List a FAT directory

    if let Some(cmd) = matches.subcommand_matches("catalog") {
        return commands::fat::catalog(cmd);
    }

    // Classify and recover deleted FAT files

    if let Some(cmd) = matches.subcommand_matches("recover") {
        return commands::fat::recover(cmd);
    }

    // Pretty-print one MFT entry

    if let Some(cmd) = matches.subcommand_matches("record") {
        return commands::ntfs::record(cmd);
    }

    // Extract a file or directory from NTFS

    if let Some(cmd) = matches.subcommand_matches("extract") {
        return commands::ntfs::extract(cmd);
    }

    // MAC times from an MFT stream

    if let Some(cmd) = matches.subcommand_matches("timeline") {
        return commands::ntfs::timeline(cmd);
    }

    // Search sectors for known file types

    if let Some(cmd) = matches.subcommand_matches("carve") {
        return commands::carve::carve(cmd);
    }

    // Display or pipe raw sectors

    if let Some(cmd) = matches.subcommand_matches("chunk") {
        return commands::chunk::chunk(cmd);
    }

    log::error!("No subcommand was found, try `dfkit --help`");
    return Err(Box::new(CommandError::InvalidCommand));
}
