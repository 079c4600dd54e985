//! Scripted ledger sessions.
//!
//! A scenario is a TOML file with an optional `[deploy]` table and a list of
//! `[[step]]` tables. Each step names the calling principal by label (or `0x`
//! address) and one ledger operation. Token amounts are whole-token decimal
//! strings; `value` and `price` are ether decimal strings.
//!
//! ```toml
//! [[step]]
//! caller = "owner"
//! op = "grant_minter_role"
//! account = "minter"
//!
//! [[step]]
//! caller = "alice"
//! op = "buy_tokens"
//! value = "0.5"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mtk_ledger::{
    resolve_principal, AuditReport, DeployConfig, EventRecord, InMemoryPayouts, LedgerError,
    SupplyAuditor, TokenLedger, TokenReader, TokenWriter,
};
use mtk_types::{format_units, parse_units, Amount, Principal, Role, DECIMALS};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Overrides the deploy section of the configuration file.
    pub deploy: Option<DeployConfig>,
    #[serde(rename = "step", default)]
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Step {
    pub caller: String,
    #[serde(flatten)]
    pub op: Operation,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Transfer { to: String, amount: String },
    Approve { spender: String, amount: String },
    TransferFrom { from: String, to: String, amount: String },
    Mint { to: String, amount: String },
    Burn { amount: String },
    BuyTokens { value: String },
    SetTokenPrice { price: String },
    Withdraw,
    GrantRole { role: String, account: String },
    RevokeRole { role: String, account: String },
    RenounceRole { role: String },
    GrantMinterRole { account: String },
    RevokeMinterRole { account: String },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer { to, amount } => write!(f, "transfer {amount} MTK to {to}"),
            Self::Approve { spender, amount } => write!(f, "approve {spender} for {amount} MTK"),
            Self::TransferFrom { from, to, amount } => {
                write!(f, "transfer {amount} MTK from {from} to {to}")
            }
            Self::Mint { to, amount } => write!(f, "mint {amount} MTK to {to}"),
            Self::Burn { amount } => write!(f, "burn {amount} MTK"),
            Self::BuyTokens { value } => write!(f, "buy tokens with {value} ETH"),
            Self::SetTokenPrice { price } => write!(f, "set token price to {price} ETH"),
            Self::Withdraw => write!(f, "withdraw"),
            Self::GrantRole { role, account } => write!(f, "grant {role} to {account}"),
            Self::RevokeRole { role, account } => write!(f, "revoke {role} from {account}"),
            Self::RenounceRole { role } => write!(f, "renounce {role}"),
            Self::GrantMinterRole { account } => write!(f, "grant MINTER to {account}"),
            Self::RevokeMinterRole { account } => write!(f, "revoke MINTER from {account}"),
        }
    }
}

impl Scenario {
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("invalid scenario")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml(&source)
    }

    /// Every label the scenario mentions, so reports can name addresses.
    /// Malformed addresses are skipped; their steps fail when run.
    pub fn labels(&self) -> BTreeMap<Principal, String> {
        let mut labels = BTreeMap::new();
        let mut note = |label: &str| {
            if let Ok(principal) = resolve_principal(label) {
                labels
                    .entry(principal)
                    .or_insert_with(|| label.trim().to_string());
            }
        };
        if let Some(deploy) = &self.deploy {
            note(&deploy.deployer);
        }
        for step in &self.steps {
            note(&step.caller);
            match &step.op {
                Operation::Transfer { to, .. } | Operation::Mint { to, .. } => note(to),
                Operation::Approve { spender, .. } => note(spender),
                Operation::TransferFrom { from, to, .. } => {
                    note(from);
                    note(to);
                }
                Operation::GrantRole { account, .. }
                | Operation::RevokeRole { account, .. }
                | Operation::GrantMinterRole { account }
                | Operation::RevokeMinterRole { account } => note(account),
                Operation::Burn { .. }
                | Operation::BuyTokens { .. }
                | Operation::SetTokenPrice { .. }
                | Operation::Withdraw
                | Operation::RenounceRole { .. } => {}
            }
        }
        labels
    }
}

fn amount(s: &str) -> Result<Amount, LedgerError> {
    Ok(parse_units(s, DECIMALS)?)
}

fn role(s: &str) -> Result<Role, LedgerError> {
    Ok(s.parse::<Role>()?)
}

impl Operation {
    /// Execute against `ledger` as `caller`. Returns a one-line summary.
    pub fn execute(
        &self,
        ledger: &TokenLedger,
        payouts: &InMemoryPayouts,
        caller: &Principal,
    ) -> Result<String, LedgerError> {
        match self {
            Self::Transfer { to, amount: a } => {
                ledger.transfer(caller, &resolve_principal(to)?, amount(a)?)?;
                Ok("transferred".into())
            }
            Self::Approve { spender, amount: a } => {
                ledger.approve(caller, &resolve_principal(spender)?, amount(a)?)?;
                Ok("approved".into())
            }
            Self::TransferFrom { from, to, amount: a } => {
                let (from, to) = (resolve_principal(from)?, resolve_principal(to)?);
                ledger.transfer_from(caller, &from, &to, amount(a)?)?;
                Ok("transferred".into())
            }
            Self::Mint { to, amount: a } => {
                ledger.mint(caller, &resolve_principal(to)?, amount(a)?)?;
                Ok("minted".into())
            }
            Self::Burn { amount: a } => {
                ledger.burn(caller, amount(a)?)?;
                Ok("burned".into())
            }
            Self::BuyTokens { value } => {
                let minted = ledger.buy_tokens(caller, amount(value)?)?;
                Ok(format!("bought {} MTK", format_units(minted, DECIMALS)))
            }
            Self::SetTokenPrice { price } => {
                ledger.set_token_price(caller, amount(price)?)?;
                Ok("price updated".into())
            }
            Self::Withdraw => {
                let paid = ledger.withdraw(caller, payouts)?;
                Ok(format!("withdrew {} ETH", format_units(paid, DECIMALS)))
            }
            Self::GrantRole { role: r, account } => {
                ledger.grant_role(caller, role(r)?, &resolve_principal(account)?)?;
                Ok("granted".into())
            }
            Self::RevokeRole { role: r, account } => {
                ledger.revoke_role(caller, role(r)?, &resolve_principal(account)?)?;
                Ok("revoked".into())
            }
            Self::RenounceRole { role: r } => {
                ledger.renounce_role(caller, role(r)?)?;
                Ok("renounced".into())
            }
            Self::GrantMinterRole { account } => {
                ledger.grant_minter_role(caller, &resolve_principal(account)?)?;
                Ok("granted".into())
            }
            Self::RevokeMinterRole { account } => {
                ledger.revoke_minter_role(caller, &resolve_principal(account)?)?;
                Ok("revoked".into())
            }
        }
    }
}

/// Outcome of one scenario step.
#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub caller: String,
    pub operation: String,
    pub ok: bool,
    pub detail: String,
    pub events: Vec<EventRecord>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BalanceLine {
    pub label: String,
    pub address: Principal,
    pub balance: Amount,
}

/// Outcome of a whole scenario run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    pub balances: Vec<BalanceLine>,
    pub total_supply: Amount,
    pub token_price: Amount,
    pub native_balance: Amount,
    pub paid_out: Amount,
    pub audit: AuditReport,
}

impl RunReport {
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }
}

/// Run every step in order. A failing step is recorded and the run continues.
pub fn run(scenario: &Scenario, ledger: &TokenLedger) -> RunReport {
    let payouts = InMemoryPayouts::new();
    let labels = scenario.labels();
    let mut steps = Vec::with_capacity(scenario.steps.len());

    for (index, step) in scenario.steps.iter().enumerate() {
        let seen = ledger.last_seq();

        let outcome = resolve_principal(&step.caller)
            .and_then(|caller| step.op.execute(ledger, &payouts, &caller));
        let (ok, detail) = match outcome {
            Ok(detail) => (true, detail),
            Err(err) => (false, err.to_string()),
        };
        debug!(step = index + 1, caller = %step.caller, ok, "scenario step");

        steps.push(StepReport {
            index: index + 1,
            caller: step.caller.clone(),
            operation: step.op.to_string(),
            ok,
            detail,
            events: ledger.events_since(seen),
        });
    }

    let balances = ledger
        .holders()
        .into_iter()
        .map(|(address, balance)| BalanceLine {
            label: labels
                .get(&address)
                .cloned()
                .unwrap_or_else(|| address.short_id()),
            address,
            balance,
        })
        .collect();

    let report = RunReport {
        steps,
        balances,
        total_supply: ledger.total_supply(),
        token_price: ledger.token_price(),
        native_balance: ledger.native_balance(),
        paid_out: payouts.total(),
        audit: SupplyAuditor::audit_ledger(ledger),
    };
    info!(
        steps = report.steps.len(),
        failed = report.failed_steps(),
        "scenario finished"
    );
    report
}
