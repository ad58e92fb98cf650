pub mod engine;
pub mod eta;
pub mod ledger;
pub mod notifications;
pub mod persistence;

pub use engine::*;
pub use eta::*;
pub use ledger::*;
pub use notifications::*;
pub use persistence::*;
