pub mod admins;
pub mod auth;
pub mod content;
pub mod markets;
pub mod settings;
pub mod tickers;
pub mod transactions;
pub mod uploads;
pub mod users;
