pub mod pool;
pub mod protocol;
pub mod user_bet;

pub use pool::*;
pub use protocol::*;
pub use user_bet::*;
