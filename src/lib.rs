#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;

pub mod fetcher;
pub mod reporter;
pub mod runner;
pub mod sitemap;
pub mod types;
pub mod utils;
pub mod warmer;
