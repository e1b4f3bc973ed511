use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::Revert;
use crate::model::{
    address::Address,
    role::{can_manage_roles, is_admin_capable, is_assignable, is_registered, SystemRole},
};

/// A ledger account and the single system role it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    /// Set once, on registration. Accounts granted a role before registering have none.
    pub email: Option<String>,
    pub nickname: String,
    pub role: SystemRole,
    pub create_time: DateTime<Utc>,
}

/// Every known account, with the genesis root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBook {
    root: Address,
    accounts: HashMap<Address, Account>,
}

impl AccountBook {
    /// Create the book with its one permanent root account.
    pub fn genesis(root: Address, root_email: String, now: DateTime<Utc>) -> Self {
        let account = Account {
            address: root,
            email: Some(normalize_email(&root_email)),
            nickname: "root".to_string(),
            role: SystemRole::Root,
            create_time: now,
        };
        Self {
            root,
            accounts: HashMap::from([(root, account)]),
        }
    }

    pub fn root(&self) -> Address {
        self.root
    }

    pub fn get(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn role_of(&self, address: &Address) -> SystemRole {
        self.get(address)
            .map(|account| account.role)
            .unwrap_or_default()
    }

    /// Every account belonging in the admin roster, root included.
    pub fn admins(&self) -> Vec<Account> {
        let mut admins = self
            .accounts
            .values()
            .filter(|account| is_admin_capable(account.role))
            .cloned()
            .collect::<Vec<_>>();
        admins.sort_by_key(|account| account.address);
        admins
    }

    /// Grant `role` to `target`, creating the account if needed. Root only.
    pub fn set_role(
        &mut self,
        caller: &Address,
        target: &Address,
        role: SystemRole,
        now: DateTime<Utc>,
    ) -> Result<(), Revert> {
        if !can_manage_roles(self.role_of(caller)) {
            return Err(Revert::NotAuthorized(format!(
                "{caller} may not change system roles"
            )));
        }
        if *target == self.root {
            return Err(Revert::InvalidRole("the root account cannot be changed".to_string()));
        }
        if !is_assignable(role) {
            return Err(Revert::InvalidRole(format!("{role} cannot be granted")));
        }

        self.accounts
            .entry(*target)
            .or_insert_with(|| Account {
                address: *target,
                email: None,
                nickname: String::new(),
                role: SystemRole::None,
                create_time: now,
            })
            .role = role;
        Ok(())
    }

    /// Register `address` as a user with the given profile.
    pub fn register(
        &mut self,
        address: &Address,
        email: String,
        nickname: String,
        now: DateTime<Utc>,
    ) -> Result<(), Revert> {
        let email = normalize_email(&email);
        if email.is_empty() || nickname.trim().is_empty() {
            return Err(Revert::InvalidSpec(
                "email and nickname must not be empty".to_string(),
            ));
        }
        if let Some(existing) = self.get(address) {
            if existing.email.is_some() {
                return Err(Revert::AlreadyRegistered(*address));
            }
        }
        let taken = self
            .accounts
            .values()
            .any(|account| account.email.as_deref() == Some(email.as_str()));
        if taken {
            return Err(Revert::EmailTaken(email));
        }

        let account = self.accounts.entry(*address).or_insert_with(|| Account {
            address: *address,
            email: None,
            nickname: String::new(),
            role: SystemRole::None,
            create_time: now,
        });
        account.email = Some(email);
        account.nickname = nickname;
        if account.role == SystemRole::None {
            account.role = SystemRole::User;
        }
        Ok(())
    }

    pub fn update_nickname(&mut self, address: &Address, nickname: String) -> Result<(), Revert> {
        if nickname.trim().is_empty() {
            return Err(Revert::InvalidSpec("nickname must not be empty".to_string()));
        }
        match self.accounts.get_mut(address) {
            Some(account) if is_registered(account.role) => {
                account.nickname = nickname;
                Ok(())
            }
            _ => Err(Revert::AccountNotFound(*address)),
        }
    }
}

/// Emails are compared trimmed and lower-cased.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> AccountBook {
        AccountBook::genesis(Address::example(0), "root@example.com".to_string(), Utc::now())
    }

    #[test]
    fn genesis_has_single_root() {
        let book = book();
        assert_eq!(book.role_of(&Address::example(0)), SystemRole::Root);
        assert_eq!(book.admins().len(), 1);
    }

    #[test]
    fn root_grants_and_revokes_admin() {
        let mut book = book();
        let root = book.root();
        let z = Address::example(5);

        book.set_role(&root, &z, SystemRole::Admin, Utc::now()).unwrap();
        assert_eq!(book.role_of(&z), SystemRole::Admin);
        assert_eq!(book.admins().len(), 2);

        book.set_role(&root, &z, SystemRole::User, Utc::now()).unwrap();
        assert_eq!(book.role_of(&z), SystemRole::User);
        assert_eq!(book.admins().len(), 1);
    }

    #[test]
    fn non_root_cannot_set_roles() {
        let mut book = book();
        let root = book.root();
        let admin = Address::example(5);
        book.set_role(&root, &admin, SystemRole::Admin, Utc::now()).unwrap();

        let result = book.set_role(&admin, &Address::example(6), SystemRole::Admin, Utc::now());
        assert!(matches!(result, Err(Revert::NotAuthorized(_))));
        assert_eq!(book.role_of(&Address::example(6)), SystemRole::None);
    }

    #[test]
    fn root_is_permanent_and_unique() {
        let mut book = book();
        let root = book.root();
        let result = book.set_role(&root, &root, SystemRole::User, Utc::now());
        assert!(matches!(result, Err(Revert::InvalidRole(_))));
        let result = book.set_role(&root, &Address::example(5), SystemRole::Root, Utc::now());
        assert!(matches!(result, Err(Revert::InvalidRole(_))));
        assert_eq!(book.role_of(&root), SystemRole::Root);
    }

    #[test]
    fn register_sets_profile_once() {
        let mut book = book();
        let user = Address::example(7);
        book.register(&user, "U@Example.com".to_string(), "u".to_string(), Utc::now())
            .unwrap();
        let account = book.get(&user).unwrap();
        assert_eq!(account.email.as_deref(), Some("u@example.com"));
        assert_eq!(account.role, SystemRole::User);

        let result = book.register(&user, "other@example.com".to_string(), "u".to_string(), Utc::now());
        assert_eq!(result, Err(Revert::AlreadyRegistered(user)));
    }

    #[test]
    fn register_rejects_taken_email() {
        let mut book = book();
        let result = book.register(
            &Address::example(7),
            "root@example.com".to_string(),
            "imposter".to_string(),
            Utc::now(),
        );
        assert_eq!(result, Err(Revert::EmailTaken("root@example.com".to_string())));
    }

    #[test]
    fn root_email_is_taken_in_any_case() {
        let mut book = AccountBook::genesis(
            Address::example(0),
            " Root@Example.com".to_string(),
            Utc::now(),
        );
        assert_eq!(
            book.get(&Address::example(0)).unwrap().email.as_deref(),
            Some("root@example.com")
        );
        let result = book.register(
            &Address::example(7),
            "root@example.com".to_string(),
            "imposter".to_string(),
            Utc::now(),
        );
        assert_eq!(result, Err(Revert::EmailTaken("root@example.com".to_string())));
    }

    #[test]
    fn register_keeps_granted_role() {
        let mut book = book();
        let root = book.root();
        let admin = Address::example(5);
        book.set_role(&root, &admin, SystemRole::Admin, Utc::now()).unwrap();
        book.register(&admin, "a@example.com".to_string(), "a".to_string(), Utc::now())
            .unwrap();
        assert_eq!(book.role_of(&admin), SystemRole::Admin);
    }

    #[test]
    fn nickname_updates_require_registration() {
        let mut book = book();
        let user = Address::example(7);
        assert_eq!(
            book.update_nickname(&user, "x".to_string()),
            Err(Revert::AccountNotFound(user))
        );
        book.register(&user, "u@example.com".to_string(), "u".to_string(), Utc::now())
            .unwrap();
        book.update_nickname(&user, "renamed".to_string()).unwrap();
        assert_eq!(book.get(&user).unwrap().nickname, "renamed");
    }
}
