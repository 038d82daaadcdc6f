//! Authentication handlers: registration, login, session refresh, logout,
//! password reset, and profile management.

pub mod login;
pub mod password;
pub mod principal;
pub mod profile;
pub mod register;
pub mod reset;
pub mod session;
pub mod state;
pub mod storage;
pub mod tokens;
pub mod types;
pub mod utils;

pub use state::{AuthConfig, AuthState};

#[cfg(test)]
mod tests;
