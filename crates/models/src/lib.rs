pub mod db;
pub mod errors;
pub mod user_account;

#[cfg(test)]
mod tests;
