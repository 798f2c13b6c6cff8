//! OneBot v11 protocol client.
//!
//! Events arrive over a forward WebSocket ([`EventStream`]); actions go out
//! through the HTTP API ([`HttpBotApi`]).

pub mod api;
pub mod event;
pub mod http;
pub mod message;
pub mod ws;

pub use api::{BotApi, GroupMemberInfo};
pub use event::{
    Event, GroupJoinRequest, GroupMemberChange, GroupMessageEvent, GroupRole, GroupSender,
    PrivateMessageEvent,
};
pub use http::HttpBotApi;
pub use message::{Message, Segment};
pub use ws::EventStream;
