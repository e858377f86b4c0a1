use std::collections::HashSet;

use bigdecimal::Zero;

use crate::models::{TransactionRecord, ZERO_ADDRESS};

/// Addresses known to hold contract code. Stored lowercase.
#[derive(Debug, Clone, Default)]
pub struct ContractAddressSet {
    addresses: HashSet<String>,
}

impl ContractAddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: &str) {
        self.addresses.insert(address.to_lowercase());
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(&address.to_lowercase())
    }
}

impl<S: AsRef<str>> FromIterator<S> for ContractAddressSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for address in iter {
            set.insert(address.as_ref());
        }
        set
    }
}

/// Admits EOA to EOA transfers that succeeded and moved a non-zero value.
pub struct OrganicFilter<'a> {
    contracts: &'a ContractAddressSet,
}

impl<'a> OrganicFilter<'a> {
    pub fn new(contracts: &'a ContractAddressSet) -> Self {
        Self { contracts }
    }

    pub fn admits(&self, tx: &TransactionRecord) -> bool {
        let Some(to) = tx.to.as_deref() else {
            return false;
        };
        tx.success
            && carries_value(tx)
            && self.is_eoa(&tx.from)
            && self.is_eoa(to)
    }

    fn is_eoa(&self, address: &str) -> bool {
        !address.eq_ignore_ascii_case(ZERO_ADDRESS) && !self.contracts.contains(address)
    }
}

pub fn carries_value(tx: &TransactionRecord) -> bool {
    !tx.value.is_zero()
}
