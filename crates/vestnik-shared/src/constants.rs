//! Application-wide constants.

/// Avatar shown for users (and chat previews) without an uploaded image.
pub const DEFAULT_AVATAR: &str = "/default_profile.png";

/// Longest message text accepted by the message writer.
pub const MAX_MESSAGE_LEN: usize = 4_096;

/// Longest post body accepted by the post writer.
pub const MAX_POST_LEN: usize = 16_384;

/// Images attached to a single post.
pub const MAX_POST_IMAGES: usize = 10;

/// Attempts a conditional write makes before giving up with a conflict.
pub const CAS_ATTEMPTS: u32 = 8;

/// Default and maximum page sizes for the news feed.
pub const FEED_PAGE_SIZE: usize = 20;
pub const FEED_PAGE_MAX: usize = 100;
