use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mtk",
    about = "MyToken (MTK) ledger: deploy, quote, and run scripted token scenarios",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show token metadata and deployment parameters
    Info(InfoArgs),
    /// Preview how many tokens a purchase yields
    Quote(QuoteArgs),
    /// Deploy a ledger and execute a scenario file against it
    Run(RunArgs),
    /// Show the address a label derives to
    Principal(PrincipalArgs),
}

#[derive(Args)]
pub struct InfoArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct QuoteArgs {
    /// Ether sent with the purchase
    #[arg(long)]
    pub value: String,
    /// Ether per whole token; defaults to the configured deploy price
    #[arg(long)]
    pub price: Option<String>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    pub scenario: PathBuf,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Print every event emitted by each step
    #[arg(long)]
    pub events: bool,
}

#[derive(Args)]
pub struct PrincipalArgs {
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_info() {
        let cli = Cli::try_parse_from(["mtk", "info"]).unwrap();
        if let Command::Info(args) = cli.command {
            assert!(args.config.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_info_with_config() {
        let cli = Cli::try_parse_from(["mtk", "info", "-c", "mtk.toml"]).unwrap();
        if let Command::Info(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("mtk.toml")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_quote() {
        let cli =
            Cli::try_parse_from(["mtk", "quote", "--value", "1.5", "--price", "0.01"]).unwrap();
        if let Command::Quote(args) = cli.command {
            assert_eq!(args.value, "1.5");
            assert_eq!(args.price, Some("0.01".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn quote_requires_value() {
        assert!(Cli::try_parse_from(["mtk", "quote"]).is_err());
    }

    #[test]
    fn parse_run() {
        let cli = Cli::try_parse_from(["mtk", "run", "demo.toml", "--events"]).unwrap();
        if let Command::Run(args) = cli.command {
            assert_eq!(args.scenario, PathBuf::from("demo.toml"));
            assert!(args.events);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_principal() {
        let cli = Cli::try_parse_from(["mtk", "principal", "alice"]).unwrap();
        if let Command::Principal(args) = cli.command {
            assert_eq!(args.label, "alice");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["mtk", "--verbose", "info"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["mtk", "principal", "bob", "--format", "json"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
