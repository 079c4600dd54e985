use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use serde_json::json;

use mtk_ledger::{purchase_amount, resolve_principal, Config, EventRecord, TokenLedger};
use mtk_types::{format_units, parse_units, Principal, Role, TokenMetadata, DECIMALS};

use crate::cli::*;
use crate::scenario::{self, RunReport, Scenario};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Info(args) => cmd_info(args, cli.format),
        Command::Quote(args) => cmd_quote(args, cli.format),
        Command::Run(args) => cmd_run(args, cli.format),
        Command::Principal(args) => cmd_principal(args, cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn ether(value: u128) -> String {
    format_units(value, DECIMALS)
}

fn cmd_info(args: InfoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let params = config.deploy.params()?;
    let deployer = config.deploy.deployer().context("invalid deployer")?;
    let meta = TokenMetadata::MY_TOKEN;
    let roles: Vec<(Role, String)> = Role::ALL
        .into_iter()
        .map(|role| (role, format!("0x{}", hex::encode(role.id()))))
        .collect();

    match format {
        OutputFormat::Json => {
            let out = json!({
                "name": meta.name,
                "symbol": meta.symbol,
                "decimals": meta.decimals,
                "deployer": deployer,
                "initial_supply": params.initial_supply.to_string(),
                "initial_token_price": params.initial_token_price.to_string(),
                "roles": roles
                    .iter()
                    .map(|(role, id)| json!({ "role": role, "id": id }))
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("{} ({})", meta.name.bold(), meta.symbol.yellow());
            println!("  Decimals: {}", meta.decimals);
            println!("  Deployer: {} ({})", config.deploy.deployer.bold(), deployer.to_string().cyan());
            println!("  Initial supply: {} {}", ether(params.initial_supply), meta.symbol);
            println!("  Token price: {} ETH", ether(params.initial_token_price));
            println!("  Event channel capacity: {}", config.ledger.event_channel_capacity);
            println!("  Roles:");
            for (role, id) in &roles {
                println!("    {:<8} {}", role.to_string().bold(), id.dimmed());
            }
        }
    }
    Ok(())
}

fn cmd_quote(args: QuoteArgs, format: OutputFormat) -> anyhow::Result<()> {
    let value = parse_units(&args.value, DECIMALS).context("invalid --value")?;
    let price = match &args.price {
        Some(price) => parse_units(price, DECIMALS).context("invalid --price")?,
        None => {
            load_config(args.config.as_deref())?
                .deploy
                .params()?
                .initial_token_price
        }
    };
    let minted = purchase_amount(value, price)?;

    match format {
        OutputFormat::Json => {
            let out = json!({
                "value": value.to_string(),
                "price": price.to_string(),
                "tokens": minted.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!(
                "{} ETH at {} ETH/MTK buys {} MTK",
                ether(value),
                ether(price),
                ether(minted).green().bold()
            );
        }
    }
    Ok(())
}

fn cmd_run(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    let scenario = Scenario::load(&args.scenario)?;
    if let Some(deploy) = &scenario.deploy {
        config.deploy = deploy.clone();
    }

    let ledger = TokenLedger::from_config(&config).context("deploying ledger")?;
    let report = scenario::run(&scenario, &ledger);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report, args.events),
    }
    Ok(())
}

fn print_events(events: &[EventRecord]) {
    for record in events {
        println!(
            "      {} {}",
            format!("#{}", record.seq).dimmed(),
            record.event.to_string().blue()
        );
    }
}

fn print_report(report: &RunReport, show_events: bool) {
    for step in &report.steps {
        let mark = if step.ok { "✓".green() } else { "✗".red() };
        println!(
            "{} {:>3}. {} {}",
            mark,
            step.index,
            step.caller.bold(),
            step.operation
        );
        if step.ok {
            println!("      {}", step.detail.dimmed());
        } else {
            println!("      {}", step.detail.red());
        }
        if show_events {
            print_events(&step.events);
        }
    }

    println!("\n{}", "Balances".bold());
    for line in &report.balances {
        println!(
            "  {:<16} {} {}",
            line.label,
            line.address.short_id().cyan(),
            ether(line.balance)
        );
    }
    println!("\nTotal supply: {} MTK", ether(report.total_supply).bold());
    println!("Token price: {} ETH", ether(report.token_price));
    println!("Native balance: {} ETH", ether(report.native_balance));
    println!("Paid out: {} ETH", ether(report.paid_out));

    let audit = &report.audit;
    if audit.is_clean() {
        println!(
            "\n{} Audit clean ({} events, supply balanced, replay converges)",
            "✓".green().bold(),
            audit.event_count
        );
    } else {
        println!("\n{} Audit found {} violation(s)", "✗".red().bold(), audit.violations.len());
        for violation in &audit.violations {
            println!("  {:?}: {}", violation.kind, violation.description);
        }
    }
    if report.failed_steps() > 0 {
        println!("{} step(s) failed", report.failed_steps().to_string().yellow());
    }
}

fn cmd_principal(args: PrincipalArgs, format: OutputFormat) -> anyhow::Result<()> {
    let principal: Principal = resolve_principal(&args.label)?;
    match format {
        OutputFormat::Json => {
            let out = json!({ "label": args.label, "address": principal });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => println!("{} → {}", args.label.bold(), principal.to_string().cyan()),
    }
    Ok(())
}
