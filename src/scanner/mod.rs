pub mod grammar;
pub mod tag;
pub mod walker;
pub mod observer;
pub mod hover;
pub mod engine;

pub use grammar::*;
pub use tag::*;
pub use walker::*;
pub use observer::*;
pub use hover::*;
pub use engine::*;
