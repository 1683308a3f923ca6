pub mod machine;
pub mod router;
pub mod session;

pub use machine::{Step, WorkflowMachine};
pub use router::GestureRouter;
pub use session::WorkflowSession;
