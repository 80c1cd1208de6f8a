use clap::Parser;
use clap::error::ErrorKind;
use dirnest::cli::{ArgumentError, Cli, CliError};
use dirnest::output::OutputFormatter;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            match e.kind() {
                ErrorKind::MissingRequiredArgument
                | ErrorKind::UnknownArgument
                | ErrorKind::TooManyValues => {
                    OutputFormatter::plain(&ArgumentError::Usage.to_string());
                }
                _ => {
                    let _ = e.print();
                }
            }
            return;
        }
    };

    match cli.run() {
        Ok(()) => {}
        // Argument-shape problems go to stdout like the usage message
        Err(CliError::Arguments(e)) => OutputFormatter::plain(&e.to_string()),
        Err(e) => OutputFormatter::error(&format!("Error: {}", e)),
    }
}
