mod queue;
mod reconnect;

#[cfg(test)]
mod tests;

pub use queue::ActionQueue;
pub use reconnect::spawn_reconnect_sync;
