//! Identifier newtypes shared by the queue core and its collaborators.
//!
//! Transports (Telegram, Max) identify users, chats and messages by integers.
//! Wrapping them keeps a user id from being passed where a message id is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Macro to define integer-backed ID types with minimal boilerplate
macro_rules! define_int_id {
    ($(#[$meta:meta])* $type_name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $type_name(pub i64);

        impl $type_name {
            pub const PREFIX: &'static str = $prefix;

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl Display for $type_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", Self::PREFIX, self.0)
            }
        }

        impl From<i64> for $type_name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $type_name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .strip_prefix(concat!($prefix, ":"))
                    .unwrap_or(s);
                raw.parse::<i64>().map(Self)
            }
        }
    };
}

define_int_id!(
    /// A transport user. Each user owns an isolated queue.
    UserId,
    "user"
);

define_int_id!(
    /// A chat that notices are posted into.
    ChatId,
    "chat"
);

define_int_id!(
    /// A transport message id.
    ///
    /// Transports assign these in send order, which makes them the stable
    /// ordering key for batched submissions.
    MessageId,
    "msg"
);

/// Handle to a position notice posted by the status messenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoticeHandle {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl NoticeHandle {
    pub fn new(chat_id: impl Into<ChatId>, message_id: impl Into<MessageId>) -> Self {
        Self {
            chat_id: chat_id.into(),
            message_id: message_id.into(),
        }
    }
}

impl Display for NoticeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notice({}/{})", self.chat_id, self.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefix() {
        assert_eq!(UserId(42).to_string(), "user:42");
        assert_eq!(MessageId(7).to_string(), "msg:7");
        assert_eq!(
            NoticeHandle::new(1, 99).to_string(),
            "notice(chat:1/msg:99)"
        );
    }

    #[test]
    fn parses_with_or_without_prefix() {
        assert_eq!("user:15".parse::<UserId>().unwrap(), UserId(15));
        assert_eq!("15".parse::<UserId>().unwrap(), UserId(15));
        assert!("user:abc".parse::<UserId>().is_err());
    }

    #[test]
    fn message_ids_order_numerically() {
        let mut ids = vec![MessageId(30), MessageId(4), MessageId(12)];
        ids.sort();
        assert_eq!(ids, vec![MessageId(4), MessageId(12), MessageId(30)]);
    }
}
