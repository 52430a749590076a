pub mod builder;
pub mod channel;
pub mod discord;
pub mod format;
pub mod payload;
pub mod remote;

pub use builder::PresenceBuilder;
pub use channel::{ChannelError, PresenceChannel};
pub use format::{BaseIcons, DisplayZone};
pub use payload::PresencePayload;
