pub mod account;
pub mod money;
pub mod transaction;

pub use account::{Account, AccountId, ChartOfAccounts};
pub use money::Money;
pub use transaction::{MatchSource, Transaction, TransactionType};
