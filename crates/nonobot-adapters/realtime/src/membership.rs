//! Channel membership tracking.

use std::collections::HashSet;

use crate::model::ChannelInfo;

/// How a channel relates to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// The bot belongs to the channel; it only reacts to mentions.
    Member,
    /// The bot knows the channel but is not (or no longer) in it.
    NonMember,
    /// Never announced: a direct conversation with the bot.
    Direct,
}

/// The channels the bot belongs to, and the ones it has seen.
///
/// Joining and leaving are idempotent.
#[derive(Debug, Clone, Default)]
pub struct ChannelMembership {
    joined: HashSet<String>,
    known: HashSet<String>,
}

impl ChannelMembership {
    /// Creates an empty membership.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the channels listed at discovery.
    pub fn seed(&mut self, channels: &[ChannelInfo]) {
        for channel in channels {
            if channel.is_member {
                self.join(&channel.id);
            } else {
                self.known.insert(channel.id.clone());
            }
        }
    }

    /// Adds a channel. Returns `false` if the bot already belonged to it.
    pub fn join(&mut self, channel: &str) -> bool {
        self.known.insert(channel.to_string());
        self.joined.insert(channel.to_string())
    }

    /// Removes a channel. Returns `false` if the bot did not belong to it.
    pub fn leave(&mut self, channel: &str) -> bool {
        self.known.insert(channel.to_string());
        self.joined.remove(channel)
    }

    /// Whether the bot belongs to `channel`.
    pub fn contains(&self, channel: &str) -> bool {
        self.joined.contains(channel)
    }

    /// Classifies `channel`.
    pub fn classify(&self, channel: &str) -> ChannelKind {
        if self.joined.contains(channel) {
            ChannelKind::Member
        } else if self.known.contains(channel) {
            ChannelKind::NonMember
        } else {
            ChannelKind::Direct
        }
    }

    /// Channels the bot belongs to, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.joined.iter().cloned().collect();
        channels.sort();
        channels
    }

    /// Number of channels the bot belongs to.
    pub fn len(&self) -> usize {
        self.joined.len()
    }

    /// Whether the bot belongs to no channel.
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, is_member: bool) -> ChannelInfo {
        ChannelInfo {
            id: id.into(),
            is_member,
        }
    }

    #[test]
    fn test_seed() {
        let mut membership = ChannelMembership::new();
        membership.seed(&[info("C1", true), info("C2", false)]);

        assert_eq!(membership.channels(), vec!["C1".to_string()]);
        assert_eq!(membership.classify("C1"), ChannelKind::Member);
        assert_eq!(membership.classify("C2"), ChannelKind::NonMember);
        assert_eq!(membership.classify("D1"), ChannelKind::Direct);
    }

    #[test]
    fn test_join_leave_idempotent() {
        let mut membership = ChannelMembership::new();
        assert!(membership.join("C1"));
        assert!(!membership.join("C1"));
        assert_eq!(membership.len(), 1);

        assert!(membership.leave("C1"));
        assert!(!membership.leave("C1"));
        assert!(membership.is_empty());
        assert_eq!(membership.classify("C1"), ChannelKind::NonMember);
    }
}
