use clap::{arg, command, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to config.toml
    #[arg(short, long, value_hint = clap::ValueHint::FilePath, env, default_value(".config/config.toml"))]
    pub config: String,
    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialOrd, PartialEq)]
pub enum Commands {
    /// Checks the song store and the catalog credentials, prints a json report and exits.
    Healthcheck,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_healthcheck_subcommand() {
        let args = Args::parse_from(["sotd_bot", "--config", "bot.toml", "healthcheck"]);

        assert_eq!("bot.toml", args.config);
        assert_eq!(Some(Commands::Healthcheck), args.command);
    }

    #[test]
    fn no_subcommand_runs_the_bot() {
        let args = Args::parse_from(["sotd_bot", "-c", "bot.toml"]);

        assert!(args.command.is_none());
    }
}
