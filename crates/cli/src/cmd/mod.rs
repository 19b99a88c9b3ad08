mod push;
mod start;

pub use push::cmd_push;
pub use start::{cmd_start, cmd_stop};
