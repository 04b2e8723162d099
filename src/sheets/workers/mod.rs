mod realtime;
mod refresher;

pub use realtime::spawn_realtime_listener;
pub use refresher::spawn_token_refresher;
