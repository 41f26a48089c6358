pub mod extract;
pub mod prompt;
