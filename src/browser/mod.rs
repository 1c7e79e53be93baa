pub mod chrome;
pub mod selector;

pub use chrome::{ChromeDriver, ChromeElement, ConnectionMode};
pub use selector::Selector;
