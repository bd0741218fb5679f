//! Notification domain model.
//!
//! Types shared by the orchestrator, channel adapters, preference resolver,
//! and scheduler. The persisted [`Notification`] record is owned by the
//! delivery record store; channel adapters only ever see the immutable
//! request data and return a [`ChannelResult`].

mod types;

pub use types::{
    Channel, ChannelResult, Notification, NotificationKind, NotificationRequest,
    NotificationRequestBuilder, NotificationStatus, Priority,
};
