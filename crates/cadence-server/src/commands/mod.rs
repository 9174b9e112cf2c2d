pub mod process;
pub mod upcoming;
