pub mod apply;
pub mod destroy;
pub mod generate;
pub mod init;
