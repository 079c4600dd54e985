use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use mtk_types::{Principal, Role};

use crate::error::AccessError;

/// Set-membership table keyed by (role, principal).
///
/// Authorization is a pure predicate ([`Self::check_role`]) evaluated before
/// any mutation. Mutating calls return `Ok(true)` when membership actually
/// changed and `Ok(false)` for idempotent no-ops, so the caller can decide
/// whether to emit an event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlRegistry {
    members: BTreeMap<Role, BTreeSet<Principal>>,
}

impl AccessControlRegistry {
    /// An empty registry. Nobody can grant anything until an admin exists,
    /// so most callers want [`Self::with_admin`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose only member is `admin` holding [`Role::Admin`].
    pub fn with_admin(admin: Principal) -> Self {
        let mut registry = Self::new();
        registry.insert(Role::Admin, admin);
        registry
    }

    pub fn has_role(&self, role: Role, account: &Principal) -> bool {
        self.members
            .get(&role)
            .is_some_and(|holders| holders.contains(account))
    }

    /// `Ok(())` if `account` holds `role`, `Unauthorized` otherwise.
    pub fn check_role(&self, role: Role, account: &Principal) -> Result<(), AccessError> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized {
                account: *account,
                role,
            })
        }
    }

    /// Grant `role` to `account`. The caller must hold the role's admin role.
    pub fn grant_role(
        &mut self,
        caller: &Principal,
        role: Role,
        account: Principal,
    ) -> Result<bool, AccessError> {
        self.check_role(role.admin_role(), caller)?;
        let changed = self.insert(role, account);
        debug!(%role, account = %account.short_id(), granter = %caller.short_id(), changed, "role granted");
        Ok(changed)
    }

    /// Revoke `role` from `account`. The caller must hold the role's admin role.
    pub fn revoke_role(
        &mut self,
        caller: &Principal,
        role: Role,
        account: &Principal,
    ) -> Result<bool, AccessError> {
        self.check_role(role.admin_role(), caller)?;
        let changed = self.remove(role, account);
        debug!(%role, account = %account.short_id(), revoker = %caller.short_id(), changed, "role revoked");
        Ok(changed)
    }

    /// Drop a role the caller holds. Needs no admin rights.
    pub fn renounce_role(&mut self, caller: &Principal, role: Role) -> bool {
        self.remove(role, caller)
    }

    pub fn grant_minter_role(
        &mut self,
        caller: &Principal,
        account: Principal,
    ) -> Result<bool, AccessError> {
        self.grant_role(caller, Role::Minter, account)
    }

    pub fn revoke_minter_role(
        &mut self,
        caller: &Principal,
        account: &Principal,
    ) -> Result<bool, AccessError> {
        self.revoke_role(caller, Role::Minter, account)
    }

    /// Holders of `role` in address order.
    pub fn members(&self, role: Role) -> Vec<Principal> {
        self.members
            .get(&role)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Roles held by `account`.
    pub fn roles_of(&self, account: &Principal) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.has_role(*role, account))
            .collect()
    }

    fn insert(&mut self, role: Role, account: Principal) -> bool {
        self.members.entry(role).or_default().insert(account)
    }

    fn remove(&mut self, role: Role, account: &Principal) -> bool {
        let Some(holders) = self.members.get_mut(&role) else {
            return false;
        };
        let removed = holders.remove(account);
        if holders.is_empty() {
            self.members.remove(&role);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Principal {
        Principal::derive("owner")
    }

    fn alice() -> Principal {
        Principal::derive("alice")
    }

    fn bob() -> Principal {
        Principal::derive("bob")
    }

    #[test]
    fn with_admin_bootstraps_single_admin() {
        let registry = AccessControlRegistry::with_admin(owner());
        assert!(registry.has_role(Role::Admin, &owner()));
        assert!(!registry.has_role(Role::Minter, &owner()));
        assert_eq!(registry.members(Role::Admin), vec![owner()]);
    }

    #[test]
    fn has_role_on_empty_registry_is_false() {
        let registry = AccessControlRegistry::new();
        for role in Role::ALL {
            assert!(!registry.has_role(role, &alice()));
        }
    }

    #[test]
    fn grant_and_revoke_minter_round_trip() {
        let mut registry = AccessControlRegistry::with_admin(owner());

        assert!(registry.grant_minter_role(&owner(), alice()).unwrap());
        assert!(registry.has_role(Role::Minter, &alice()));

        assert!(registry.revoke_minter_role(&owner(), &alice()).unwrap());
        assert!(!registry.has_role(Role::Minter, &alice()));
    }

    #[test]
    fn grant_is_idempotent() {
        let mut registry = AccessControlRegistry::with_admin(owner());
        assert!(registry.grant_role(&owner(), Role::Minter, alice()).unwrap());
        assert!(!registry.grant_role(&owner(), Role::Minter, alice()).unwrap());
        assert_eq!(registry.members(Role::Minter), vec![alice()]);
    }

    #[test]
    fn revoke_absent_role_is_noop() {
        let mut registry = AccessControlRegistry::with_admin(owner());
        assert!(!registry.revoke_role(&owner(), Role::Minter, &bob()).unwrap());
    }

    #[test]
    fn non_admin_cannot_grant() {
        let mut registry = AccessControlRegistry::with_admin(owner());
        let err = registry.grant_minter_role(&alice(), bob()).unwrap_err();
        assert_eq!(
            err,
            AccessError::Unauthorized {
                account: alice(),
                role: Role::Admin
            }
        );
        assert!(!registry.has_role(Role::Minter, &bob()));
    }

    #[test]
    fn minter_cannot_grant_minter() {
        let mut registry = AccessControlRegistry::with_admin(owner());
        registry.grant_minter_role(&owner(), alice()).unwrap();
        assert!(registry.grant_minter_role(&alice(), bob()).is_err());
    }

    #[test]
    fn non_admin_cannot_revoke() {
        let mut registry = AccessControlRegistry::with_admin(owner());
        registry.grant_minter_role(&owner(), bob()).unwrap();
        assert!(registry.revoke_minter_role(&alice(), &bob()).is_err());
        assert!(registry.has_role(Role::Minter, &bob()));
    }

    #[test]
    fn admin_can_appoint_another_admin() {
        let mut registry = AccessControlRegistry::with_admin(owner());
        registry.grant_role(&owner(), Role::Admin, alice()).unwrap();
        registry.grant_minter_role(&alice(), bob()).unwrap();
        assert!(registry.has_role(Role::Minter, &bob()));

        registry.revoke_role(&alice(), Role::Admin, &owner()).unwrap();
        assert!(registry.check_role(Role::Admin, &owner()).is_err());
    }

    #[test]
    fn renounce_needs_no_admin() {
        let mut registry = AccessControlRegistry::with_admin(owner());
        registry.grant_minter_role(&owner(), alice()).unwrap();
        assert!(registry.renounce_role(&alice(), Role::Minter));
        assert!(!registry.renounce_role(&alice(), Role::Minter));
        assert!(registry.members(Role::Minter).is_empty());
    }

    #[test]
    fn roles_of_lists_memberships() {
        let mut registry = AccessControlRegistry::with_admin(owner());
        registry.grant_minter_role(&owner(), owner()).unwrap();
        assert_eq!(registry.roles_of(&owner()), vec![Role::Admin, Role::Minter]);
        assert!(registry.roles_of(&alice()).is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let mut registry = AccessControlRegistry::with_admin(owner());
        registry.grant_minter_role(&owner(), alice()).unwrap();
        let json = serde_json::to_string(&registry).unwrap();
        let parsed: AccessControlRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, registry);
    }
}
