//! Accounts: signing up, logging in and out, and managing one's profile.

pub mod change_password;
pub mod login;
pub mod logout;
pub mod profile;
pub mod register;
