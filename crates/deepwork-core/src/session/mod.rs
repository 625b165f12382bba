mod lifecycle;
mod model;
mod status;

pub use lifecycle::{PauseInterval, SessionCommand, SessionLifecycle, SessionSnapshot};
pub use model::{BackendTimezone, HistoryEntry, Interruption, NewSession, Session};
pub use status::{SessionStatus, StatusColor};
