pub mod discord;
pub mod init;
