pub mod account;
pub mod address;
pub mod auth;
pub mod index;
pub mod mongodb;
pub mod pagination;
pub mod participation;
pub mod role;
pub mod vote;
