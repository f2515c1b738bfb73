pub mod access;
pub mod feature;
pub mod staff;
pub mod user;
