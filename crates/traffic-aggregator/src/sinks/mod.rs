pub mod console;
pub mod json;
mod reporter;

pub use reporter::Reporter;
