pub mod book;
pub mod ledger;
pub mod matching;
