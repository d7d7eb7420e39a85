pub mod deadline;
pub mod error;
pub mod sys;
pub mod target;
pub mod watcher;
