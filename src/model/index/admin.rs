use serde::{Deserialize, Serialize};

use crate::model::{account::Account, address::Address};

/// An entry of the off-chain admin roster cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub wallet_address: Address,
    pub email: String,
    pub nickname: String,
}

impl From<&Account> for Admin {
    fn from(account: &Account) -> Self {
        Self {
            wallet_address: account.address,
            email: account.email.clone().unwrap_or_default(),
            nickname: account.nickname.clone(),
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl Admin {
        pub fn example(n: u8) -> Self {
            Self {
                wallet_address: Address::example(n),
                email: format!("admin{n}@example.com"),
                nickname: format!("admin {n}"),
            }
        }
    }
}
