mod countdown;
mod format;
mod ticker;

pub use countdown::{CountdownTimer, DurationReachedCallback, TimerTick};
pub use format::{format_clock, format_minutes};
pub use ticker::TickerHandle;
