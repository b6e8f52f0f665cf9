pub mod abi;
pub mod last_error;
