pub mod inotify;
pub mod poll;
