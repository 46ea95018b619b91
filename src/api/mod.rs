pub mod catalog;
pub mod client;
pub mod locators;
pub mod models;
