pub mod cli;
pub mod invoke;
pub mod runner;
pub mod testfile;
pub mod verify;

pub use runner::run;
