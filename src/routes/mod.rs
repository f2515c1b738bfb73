pub mod access;
pub mod auth;
pub mod features;
pub mod health;
pub mod staff;
pub mod users;
