pub mod auth;
pub mod catalog;
pub mod contents;
pub mod manage;
pub mod projects;
