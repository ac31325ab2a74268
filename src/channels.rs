//! Channel value type and the channel resolver used by instant recordings.

use serde::{Deserialize, Serialize};

/// A TV or radio channel as known to a backend client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Backend client that provides this channel
    pub client_id: i32,
    /// Channel unique id on that client
    pub unique_id: i32,
    /// User-visible channel number
    pub number: i32,
    pub name: String,
    pub is_radio: bool,
}

/// Resolves channels for operations that are not handed one explicitly,
/// and records the "currently recording" marker on a channel.
pub trait ChannelSource: Send + Sync {
    /// The channel the user is currently tuned to, if any.
    fn current_channel(&self) -> Option<Channel>;

    /// First channel of the default TV group, if any channels exist.
    fn first_tv_channel(&self) -> Option<Channel>;

    /// Mark a channel as recording (or no longer recording).
    fn set_recording(&self, channel: &Channel, recording: bool);
}
