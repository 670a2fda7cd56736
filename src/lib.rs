pub mod bot;
pub mod cache;
pub mod capabilities;
pub mod config;
pub mod cooldown;
pub mod dlc;
pub mod instance;
pub mod mods;
pub mod names;
pub mod profiles;
pub mod sii;
