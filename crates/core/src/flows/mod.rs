pub mod session;
pub mod states;

pub use session::{ConfiguratorSession, DefaultCpqRuntime};
pub use states::{ConfiguratorMode, SessionAction, SessionEvent, SessionEventKind, TransitionOutcome};
