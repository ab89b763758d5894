mod client;
mod health;

pub use client::whoami;
pub use health::health_check;
