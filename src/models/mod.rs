pub mod change_log;
pub mod notification;
pub mod rbac;
pub mod task;
pub mod user;
