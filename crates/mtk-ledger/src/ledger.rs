use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use mtk_access::AccessControlRegistry;
use mtk_types::{Amount, Principal, Role, TokenMetadata, ONE_TOKEN};

use crate::config::{Config, DeployParams, LedgerConfig};
use crate::error::LedgerError;
use crate::event::{EventRecord, LedgerEvent};
use crate::payout::ValueSink;
use crate::subscription::{EventFilter, EventRouter, EventStream};
use crate::traits::{TokenReader, TokenWriter};

/// In-memory token ledger.
///
/// Accounts, allowances, the role registry, the scalar counters and the
/// event log all sit behind a single lock, so every call is one indivisible
/// transaction and concurrent callers serialize with no lost updates.
pub struct TokenLedger {
    metadata: TokenMetadata,
    config: LedgerConfig,
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    balances: BTreeMap<Principal, Amount>,
    allowances: BTreeMap<Principal, BTreeMap<Principal, Amount>>,
    roles: AccessControlRegistry,
    total_supply: Amount,
    token_price: Amount,
    native_balance: Amount,
    log: Vec<EventRecord>,
    router: EventRouter,
}

/// Consistent point-in-time copy of the whole ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub metadata: TokenMetadata,
    pub total_supply: Amount,
    pub token_price: Amount,
    pub native_balance: Amount,
    pub balances: BTreeMap<Principal, Amount>,
    pub allowances: BTreeMap<Principal, BTreeMap<Principal, Amount>>,
    pub roles: AccessControlRegistry,
    pub events: Vec<EventRecord>,
}

impl TokenLedger {
    /// Create the ledger: `deployer` becomes the sole admin and receives the
    /// whole initial supply.
    pub fn deploy(deployer: Principal, params: DeployParams) -> Result<Self, LedgerError> {
        Self::deploy_with_config(deployer, params, LedgerConfig::default())
    }

    pub fn deploy_with_config(
        deployer: Principal,
        params: DeployParams,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        if params.initial_token_price == 0 {
            return Err(LedgerError::InvalidPrice);
        }
        ensure_receiver(&deployer)?;

        let mut state = LedgerState {
            roles: AccessControlRegistry::with_admin(deployer),
            total_supply: params.initial_supply,
            token_price: params.initial_token_price,
            ..LedgerState::default()
        };
        state.set_balance(deployer, params.initial_supply);
        let records = state.prepare(vec![
            LedgerEvent::RoleGranted {
                role: Role::Admin,
                account: deployer,
                sender: deployer,
            },
            LedgerEvent::Transfer {
                from: Principal::ZERO,
                to: deployer,
                amount: params.initial_supply,
            },
        ])?;
        state.append(records);

        info!(
            deployer = %deployer,
            initial_supply = params.initial_supply,
            token_price = params.initial_token_price,
            "token ledger deployed"
        );

        Ok(Self {
            metadata: TokenMetadata::MY_TOKEN,
            config,
            inner: RwLock::new(state),
        })
    }

    /// Deploy from a parsed configuration file.
    pub fn from_config(config: &Config) -> Result<Self, LedgerError> {
        Self::deploy_with_config(
            config.deploy.deployer()?,
            config.deploy.params()?,
            config.ledger.clone(),
        )
    }

    pub fn name(&self) -> &'static str {
        self.metadata.name
    }

    pub fn symbol(&self) -> &'static str {
        self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    /// Subunits a purchase of `value` wei would mint at the current price.
    pub fn quote(&self, value: Amount) -> Result<Amount, LedgerError> {
        purchase_amount(value, self.read_state().token_price)
    }

    /// Generic authorization predicate: `Unauthorized` if `account` lacks `role`.
    pub fn check_role(&self, role: Role, account: &Principal) -> Result<(), LedgerError> {
        self.read_state()
            .roles
            .check_role(role, account)
            .map_err(LedgerError::Unauthorized)
    }

    /// Subscribe to events committed from now on.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        let capacity = self.config.event_channel_capacity;
        self.write_state().router.subscribe(filter, capacity)
    }

    /// Live subscriptions as of the last routed event.
    pub fn subscriber_count(&self) -> usize {
        self.read_state().router.subscriber_count()
    }

    /// Sequence number of the newest event.
    pub fn last_seq(&self) -> u64 {
        self.read_state().log.last().map_or(0, |r| r.seq)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.read_state();
        LedgerSnapshot {
            metadata: self.metadata,
            total_supply: state.total_supply,
            token_price: state.token_price,
            native_balance: state.native_balance,
            balances: state.balances.clone(),
            allowances: state.allowances.clone(),
            roles: state.roles.clone(),
            events: state.log.clone(),
        }
    }

    // Poisoning is recovered: no code path panics between the first and the
    // last mutation of a call, so the state behind a poisoned lock is whole.
    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LedgerState {
    fn balance(&self, account: &Principal) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Principal, spender: &Principal) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn set_balance(&mut self, account: Principal, amount: Amount) {
        if amount == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }

    fn set_allowance(&mut self, owner: Principal, spender: Principal, amount: Amount) {
        if amount == 0 {
            if let Some(spenders) = self.allowances.get_mut(&owner) {
                spenders.remove(&spender);
                if spenders.is_empty() {
                    self.allowances.remove(&owner);
                }
            }
        } else {
            self.allowances
                .entry(owner)
                .or_default()
                .insert(spender, amount);
        }
    }

    /// New balances for moving `amount` from `from` to `to`, or the reason it cannot happen.
    fn plan_move(
        &self,
        from: &Principal,
        to: &Principal,
        amount: Amount,
    ) -> Result<Vec<(Principal, Amount)>, LedgerError> {
        let available = self.balance(from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        if from == to {
            return Ok(Vec::new());
        }
        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(vec![(*from, available - amount), (*to, credited)])
    }

    fn apply_balances(&mut self, writes: Vec<(Principal, Amount)>) {
        for (account, amount) in writes {
            self.set_balance(account, amount);
        }
    }

    /// Build log records for `events` without touching the log.
    fn prepare(&self, events: Vec<LedgerEvent>) -> Result<Vec<EventRecord>, LedgerError> {
        let mut records: Vec<EventRecord> = Vec::with_capacity(events.len());
        for event in events {
            let prev = records.last().or(self.log.last());
            let record = EventRecord::next(prev, event)?;
            records.push(record);
        }
        Ok(records)
    }

    fn append(&mut self, records: Vec<EventRecord>) {
        for record in records {
            self.router.route(&record);
            self.log.push(record);
        }
    }
}

impl TokenReader for TokenLedger {
    fn metadata(&self) -> TokenMetadata {
        self.metadata
    }

    fn balance_of(&self, account: &Principal) -> Amount {
        self.read_state().balance(account)
    }

    fn allowance(&self, owner: &Principal, spender: &Principal) -> Amount {
        self.read_state().allowance(owner, spender)
    }

    fn total_supply(&self) -> Amount {
        self.read_state().total_supply
    }

    fn token_price(&self) -> Amount {
        self.read_state().token_price
    }

    fn native_balance(&self) -> Amount {
        self.read_state().native_balance
    }

    fn has_role(&self, role: Role, account: &Principal) -> bool {
        self.read_state().roles.has_role(role, account)
    }

    fn role_members(&self, role: Role) -> Vec<Principal> {
        self.read_state().roles.members(role)
    }

    fn holders(&self) -> Vec<(Principal, Amount)> {
        self.read_state()
            .balances
            .iter()
            .map(|(account, amount)| (*account, *amount))
            .collect()
    }

    fn events(&self) -> Vec<EventRecord> {
        self.read_state().log.clone()
    }

    fn events_since(&self, after_seq: u64) -> Vec<EventRecord> {
        let state = self.read_state();
        let start = usize::try_from(after_seq)
            .unwrap_or(usize::MAX)
            .min(state.log.len());
        state.log[start..].to_vec()
    }
}

impl TokenWriter for TokenLedger {
    fn transfer(
        &self,
        caller: &Principal,
        to: &Principal,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        ensure_receiver(to)?;
        let mut state = self.write_state();

        let writes = state.plan_move(caller, to, amount)?;
        let records = state.prepare(vec![LedgerEvent::Transfer {
            from: *caller,
            to: *to,
            amount,
        }])?;
        state.apply_balances(writes);
        state.append(records);

        debug!(from = %caller.short_id(), to = %to.short_id(), amount, "transfer");
        Ok(())
    }

    fn approve(
        &self,
        caller: &Principal,
        spender: &Principal,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let mut state = self.write_state();

        let records = state.prepare(vec![LedgerEvent::Approval {
            owner: *caller,
            spender: *spender,
            amount,
        }])?;
        state.set_allowance(*caller, *spender, amount);
        state.append(records);

        debug!(owner = %caller.short_id(), spender = %spender.short_id(), amount, "approve");
        Ok(())
    }

    fn transfer_from(
        &self,
        caller: &Principal,
        from: &Principal,
        to: &Principal,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let mut state = self.write_state();

        let allowed = state.allowance(from, caller);
        if allowed < amount {
            return Err(LedgerError::AllowanceExceeded {
                requested: amount,
                allowed,
            });
        }
        ensure_receiver(to)?;
        let writes = state.plan_move(from, to, amount)?;
        let records = state.prepare(vec![LedgerEvent::Transfer {
            from: *from,
            to: *to,
            amount,
        }])?;
        state.set_allowance(*from, *caller, allowed - amount);
        state.apply_balances(writes);
        state.append(records);

        debug!(
            spender = %caller.short_id(),
            from = %from.short_id(),
            to = %to.short_id(),
            amount,
            "transfer_from"
        );
        Ok(())
    }

    fn mint(&self, caller: &Principal, to: &Principal, amount: Amount) -> Result<(), LedgerError> {
        let mut state = self.write_state();

        state.roles.check_role(Role::Minter, caller)?;
        ensure_receiver(to)?;
        let new_supply = state
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let new_balance = state
            .balance(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let records = state.prepare(vec![
            LedgerEvent::Mint {
                minter: *caller,
                to: *to,
                amount,
            },
            LedgerEvent::Transfer {
                from: Principal::ZERO,
                to: *to,
                amount,
            },
        ])?;
        state.total_supply = new_supply;
        state.set_balance(*to, new_balance);
        state.append(records);

        debug!(minter = %caller.short_id(), to = %to.short_id(), amount, "mint");
        Ok(())
    }

    fn burn(&self, caller: &Principal, amount: Amount) -> Result<(), LedgerError> {
        let mut state = self.write_state();

        let available = state.balance(caller);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        let new_supply = state
            .total_supply
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow)?;
        let records = state.prepare(vec![LedgerEvent::Transfer {
            from: *caller,
            to: Principal::ZERO,
            amount,
        }])?;
        state.total_supply = new_supply;
        state.set_balance(*caller, available - amount);
        state.append(records);

        debug!(holder = %caller.short_id(), amount, "burn");
        Ok(())
    }

    fn buy_tokens(&self, caller: &Principal, value: Amount) -> Result<Amount, LedgerError> {
        if value == 0 {
            return Err(LedgerError::NoValueSent);
        }
        ensure_receiver(caller)?;
        let mut state = self.write_state();

        let minted = purchase_amount(value, state.token_price)?;
        let new_native = state
            .native_balance
            .checked_add(value)
            .ok_or(LedgerError::Overflow)?;
        let new_supply = state
            .total_supply
            .checked_add(minted)
            .ok_or(LedgerError::Overflow)?;
        let new_balance = state
            .balance(caller)
            .checked_add(minted)
            .ok_or(LedgerError::Overflow)?;
        let records = state.prepare(vec![LedgerEvent::Transfer {
            from: Principal::ZERO,
            to: *caller,
            amount: minted,
        }])?;
        state.native_balance = new_native;
        state.total_supply = new_supply;
        state.set_balance(*caller, new_balance);
        state.append(records);

        debug!(buyer = %caller.short_id(), value, minted, "buy_tokens");
        Ok(minted)
    }

    fn set_token_price(&self, caller: &Principal, new_price: Amount) -> Result<(), LedgerError> {
        let mut state = self.write_state();

        state.roles.check_role(Role::Admin, caller)?;
        if new_price == 0 {
            return Err(LedgerError::InvalidPrice);
        }
        let old_price = state.token_price;
        let records = state.prepare(vec![LedgerEvent::TokenPriceUpdated {
            admin: *caller,
            old_price,
            new_price,
        }])?;
        state.token_price = new_price;
        state.append(records);

        info!(admin = %caller.short_id(), old_price, new_price, "token price updated");
        Ok(())
    }

    fn withdraw(&self, caller: &Principal, sink: &dyn ValueSink) -> Result<Amount, LedgerError> {
        let withdrawal = |amount| LedgerEvent::Withdrawal {
            admin: *caller,
            amount,
        };
        let amount = {
            let mut state = self.write_state();
            state.roles.check_role(Role::Admin, caller)?;
            let amount = state.native_balance;
            if amount == 0 {
                debug!(admin = %caller.short_id(), "withdraw with empty balance");
                return Ok(0);
            }
            // Every fallible step runs before value leaves the ledger.
            state.prepare(vec![withdrawal(amount)])?;
            state.native_balance = 0;
            amount
        };

        // The lock is released here: the sink may re-enter the ledger and
        // will observe the drained balance.
        if let Err(rejected) = sink.send_value(caller, amount) {
            let mut state = self.write_state();
            state.native_balance = state.native_balance.saturating_add(amount);
            warn!(admin = %caller.short_id(), amount, reason = %rejected, "withdraw payout refused");
            return Err(LedgerError::PayoutFailed {
                to: *caller,
                amount,
                reason: rejected.0,
            });
        }

        // The sink may have appended events, so the record is rebuilt on the
        // current log tail. The value is gone either way.
        let mut state = self.write_state();
        match state.prepare(vec![withdrawal(amount)]) {
            Ok(records) => state.append(records),
            Err(err) => error!(admin = %caller.short_id(), amount, %err, "withdrawal paid but not logged"),
        }

        info!(admin = %caller.short_id(), amount, "native balance withdrawn");
        Ok(amount)
    }

    fn grant_role(
        &self,
        caller: &Principal,
        role: Role,
        account: &Principal,
    ) -> Result<(), LedgerError> {
        let mut state = self.write_state();

        let mut roles = state.roles.clone();
        if !roles.grant_role(caller, role, *account)? {
            return Ok(());
        }
        let records = state.prepare(vec![LedgerEvent::RoleGranted {
            role,
            account: *account,
            sender: *caller,
        }])?;
        state.roles = roles;
        state.append(records);
        Ok(())
    }

    fn revoke_role(
        &self,
        caller: &Principal,
        role: Role,
        account: &Principal,
    ) -> Result<(), LedgerError> {
        let mut state = self.write_state();

        let mut roles = state.roles.clone();
        if !roles.revoke_role(caller, role, account)? {
            return Ok(());
        }
        let records = state.prepare(vec![LedgerEvent::RoleRevoked {
            role,
            account: *account,
            sender: *caller,
        }])?;
        state.roles = roles;
        state.append(records);
        Ok(())
    }

    fn renounce_role(&self, caller: &Principal, role: Role) -> Result<(), LedgerError> {
        let mut state = self.write_state();

        let mut roles = state.roles.clone();
        if !roles.renounce_role(caller, role) {
            return Ok(());
        }
        let records = state.prepare(vec![LedgerEvent::RoleRevoked {
            role,
            account: *caller,
            sender: *caller,
        }])?;
        state.roles = roles;
        state.append(records);

        debug!(%role, account = %caller.short_id(), "role renounced");
        Ok(())
    }
}

/// `value * 10^18 / price`, floored. Exact whenever the result fits in `u128`.
pub fn purchase_amount(value: Amount, price: Amount) -> Result<Amount, LedgerError> {
    if price == 0 {
        return Err(LedgerError::InvalidPrice);
    }
    // value = q * price + r, so value * 10^18 / price = q * 10^18 + r * 10^18 / price.
    let whole = (value / price)
        .checked_mul(ONE_TOKEN)
        .ok_or(LedgerError::Overflow)?;
    let fraction = (value % price)
        .checked_mul(ONE_TOKEN)
        .ok_or(LedgerError::Overflow)?
        / price;
    whole.checked_add(fraction).ok_or(LedgerError::Overflow)
}

fn ensure_receiver(account: &Principal) -> Result<(), LedgerError> {
    if account.is_zero() {
        Err(LedgerError::InvalidReceiver(*account))
    } else {
        Ok(())
    }
}
