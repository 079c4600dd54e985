use mtk_types::{Amount, Principal, Role, TokenMetadata};

use crate::error::LedgerError;
use crate::event::EventRecord;
use crate::payout::ValueSink;

/// Read boundary of the token ledger. Reads never fail.
pub trait TokenReader: Send + Sync {
    fn metadata(&self) -> TokenMetadata;

    fn balance_of(&self, account: &Principal) -> Amount;

    fn allowance(&self, owner: &Principal, spender: &Principal) -> Amount;

    fn total_supply(&self) -> Amount;

    /// Wei per whole token.
    fn token_price(&self) -> Amount;

    /// Native currency held from purchases and not yet withdrawn.
    fn native_balance(&self) -> Amount;

    fn has_role(&self, role: Role, account: &Principal) -> bool;

    /// Holders of `role` in address order.
    fn role_members(&self, role: Role) -> Vec<Principal>;

    /// Accounts with a nonzero balance, in address order.
    fn holders(&self) -> Vec<(Principal, Amount)>;

    /// The full event log from seq 1.
    fn events(&self) -> Vec<EventRecord>;

    /// Events with `seq > after_seq`.
    fn events_since(&self, after_seq: u64) -> Vec<EventRecord>;
}

/// Write boundary of the token ledger.
///
/// The caller of every operation is passed explicitly. Each call either
/// applies all of its effects and events or fails with no change at all.
pub trait TokenWriter: Send + Sync {
    fn transfer(&self, caller: &Principal, to: &Principal, amount: Amount)
        -> Result<(), LedgerError>;

    fn approve(
        &self,
        caller: &Principal,
        spender: &Principal,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    fn transfer_from(
        &self,
        caller: &Principal,
        from: &Principal,
        to: &Principal,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    fn mint(&self, caller: &Principal, to: &Principal, amount: Amount) -> Result<(), LedgerError>;

    fn burn(&self, caller: &Principal, amount: Amount) -> Result<(), LedgerError>;

    /// Purchase tokens with `value` wei. Returns the subunits minted.
    fn buy_tokens(&self, caller: &Principal, value: Amount) -> Result<Amount, LedgerError>;

    fn set_token_price(&self, caller: &Principal, new_price: Amount) -> Result<(), LedgerError>;

    /// Pay the whole native balance to the caller through `sink`. Returns the amount paid.
    fn withdraw(&self, caller: &Principal, sink: &dyn ValueSink) -> Result<Amount, LedgerError>;

    fn grant_role(&self, caller: &Principal, role: Role, account: &Principal)
        -> Result<(), LedgerError>;

    fn revoke_role(
        &self,
        caller: &Principal,
        role: Role,
        account: &Principal,
    ) -> Result<(), LedgerError>;

    fn renounce_role(&self, caller: &Principal, role: Role) -> Result<(), LedgerError>;

    fn grant_minter_role(&self, caller: &Principal, account: &Principal) -> Result<(), LedgerError> {
        self.grant_role(caller, Role::Minter, account)
    }

    fn revoke_minter_role(&self, caller: &Principal, account: &Principal) -> Result<(), LedgerError> {
        self.revoke_role(caller, Role::Minter, account)
    }
}
