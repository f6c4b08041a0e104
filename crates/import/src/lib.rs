pub mod input;
pub mod output;

pub use input::{read_transactions, read_transactions_file, ImportError};
pub use output::{write_transactions, write_transactions_file};
