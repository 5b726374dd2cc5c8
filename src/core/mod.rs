pub mod engine;
pub mod executor;
pub mod indicators;
pub mod ledger;
pub mod risk;
pub mod validator;
