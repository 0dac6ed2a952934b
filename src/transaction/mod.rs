//! Recording, listing and deleting ledger entries.

mod core;
mod create_endpoint;
mod delete_endpoint;
mod models;

pub(crate) use self::core::{create_transaction_table, get_transactions_for_account};
pub(crate) use create_endpoint::create_transaction_endpoint;
pub(crate) use delete_endpoint::delete_transaction_endpoint;
pub(crate) use models::{Category, Direction, PaymentChannel, Transaction};

#[cfg(test)]
pub(crate) use self::core::{NewTransaction, create_transaction};
