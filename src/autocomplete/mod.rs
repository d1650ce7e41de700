pub mod query;
pub mod list;
pub mod caret;
pub mod site_policy;
pub mod engine;
pub mod preview;

pub use query::*;
pub use list::*;
pub use caret::*;
pub use site_policy::*;
pub use engine::*;
pub use preview::*;

#[cfg(test)]
mod tests;
