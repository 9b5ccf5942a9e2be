pub mod account;
pub mod principal;
pub mod token;
