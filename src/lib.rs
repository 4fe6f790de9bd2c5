//! pdfrelay renders URLs, HTML, and Handlebars templates to PDF through a
//! headless browser, with plugin hooks for template headers, filters, and
//! page mutation.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
