pub mod co;
pub mod completions;
pub mod init;
pub mod project;
pub mod report;
pub mod ticket;
