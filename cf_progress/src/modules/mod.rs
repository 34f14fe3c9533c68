pub mod handlers;
pub mod inactivity;
pub mod migration;
pub mod notifier;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod sync;
