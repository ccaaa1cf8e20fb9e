pub mod ajax;
pub mod auth;
pub mod pages;
