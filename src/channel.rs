//! Canonical channel naming for chat pub/sub topics.
//!
//! A chat channel is addressed by the unordered pair of the two role-profile
//! ids participating in it. Server publishers and client subscribers both
//! derive the name from whatever order they happen to hold the ids in, so
//! the name must be commutative in its arguments. The `private-` prefix is
//! part of the wire contract with the transport: it marks the channel as
//! requiring an authorization handshake before subscription.

pub const CHANNEL_PREFIX: &str = "private-chat-";

/// Derive the canonical channel name for a pair of role-profile ids.
///
/// Commutative: `channel_name(a, b) == channel_name(b, a)`.
pub fn channel_name(profile_a: i64, profile_b: i64) -> String {
    let (lo, hi) = if profile_a <= profile_b {
        (profile_a, profile_b)
    } else {
        (profile_b, profile_a)
    };
    format!("{CHANNEL_PREFIX}{lo}-{hi}")
}

/// Parse a channel name back into its ordered (low, high) profile-id pair.
///
/// Accepts exactly the shape produced by [`channel_name`]:
/// `private-chat-<digits>-<digits>`. Anything else returns `None`, including
/// empty segments, non-digit characters, signs, and extra dashes.
pub fn parse_channel_name(name: &str) -> Option<(i64, i64)> {
    let rest = name.strip_prefix(CHANNEL_PREFIX)?;
    let (lo, hi) = rest.split_once('-')?;
    if lo.is_empty() || hi.is_empty() {
        return None;
    }
    if !lo.bytes().all(|b| b.is_ascii_digit()) || !hi.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let lo: i64 = lo.parse().ok()?;
    let hi: i64 = hi.parse().ok()?;
    Some((lo, hi))
}
