#[macro_use]
extern crate serde_derive;

pub mod cache;
pub mod config;
pub mod html;
pub mod image_url;
pub mod pages;
pub mod portable_text;
pub mod publish;
pub mod render;
pub mod sanity;
pub mod server;
pub mod shell;
