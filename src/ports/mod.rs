pub mod soulseek;
