//! The core data types for ledger entries.

use std::str::FromStr;

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::account::AccountId;

/// The row ID of a transaction in the application database.
pub(crate) type TransactionId = i64;

/// Whether a transaction brings money in or takes money out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Direction {
    /// Money coming in, e.g. a salary payment.
    Income,
    /// Money going out.
    Expense,
}

impl Direction {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Direction::Income => "income",
            Direction::Expense => "expense",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Direction::Income),
            "expense" => Ok(Direction::Expense),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

impl ToSql for Direction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Direction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// The payment medium of a transaction, used for separate sub-balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum PaymentChannel {
    /// Card or bank transfer.
    Online,
    /// Physical cash.
    Cash,
}

impl PaymentChannel {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            PaymentChannel::Online => "online",
            PaymentChannel::Cash => "cash",
        }
    }

    /// The label shown in forms and tables.
    pub(crate) fn label(self) -> &'static str {
        match self {
            PaymentChannel::Online => "Online Money",
            PaymentChannel::Cash => "Cash Money",
        }
    }
}

impl FromStr for PaymentChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(PaymentChannel::Online),
            "cash" => Ok(PaymentChannel::Cash),
            other => Err(format!("unknown payment channel: {other}")),
        }
    }
}

impl ToSql for PaymentChannel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for PaymentChannel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// The spending category of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Category {
    /// Groceries and eating out.
    Food,
    /// Buses, trains, fuel.
    Transport,
    /// Rent and utilities.
    Rent,
    /// Clothes and other purchases.
    Shopping,
    /// Wages and salary.
    Salary,
    /// Anything that does not fit the other categories.
    Other,
}

impl Category {
    /// Every category, in the order forms and charts display them.
    pub(crate) const ALL: [Category; 6] = [
        Category::Food,
        Category::Transport,
        Category::Rent,
        Category::Shopping,
        Category::Salary,
        Category::Other,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Transport => "transport",
            Category::Rent => "rent",
            Category::Shopping => "shopping",
            Category::Salary => "salary",
            Category::Other => "other",
        }
    }

    /// The human-readable label used for display and charting.
    pub(crate) fn label(self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Rent => "Rent",
            Category::Shopping => "Shopping",
            Category::Salary => "Salary",
            Category::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "food" => Ok(Category::Food),
            "transport" => Ok(Category::Transport),
            "rent" => Ok(Category::Rent),
            "shopping" => Ok(Category::Shopping),
            "salary" => Ok(Category::Salary),
            "other" => Ok(Category::Other),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// An income or expense recorded by one account.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Transaction {
    /// The ID of the transaction.
    pub(crate) id: TransactionId,
    /// The account that recorded this transaction.
    pub(crate) account_id: AccountId,
    /// Whether this is income or an expense.
    pub(crate) direction: Direction,
    /// The amount of money, always non-negative; the sign is implied by
    /// `direction`.
    pub(crate) amount: f64,
    /// The spending category.
    pub(crate) category: Category,
    /// How the money moved.
    pub(crate) channel: PaymentChannel,
    /// When the transaction happened.
    pub(crate) date: Date,
}
