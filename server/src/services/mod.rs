pub mod map_actor;
pub mod record_poller;
