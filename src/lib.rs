pub mod config;
pub mod lastfm;
pub mod logging;
pub mod ports;
pub mod services;
pub mod soulseek;

#[cfg(test)]
mod test_utils;
