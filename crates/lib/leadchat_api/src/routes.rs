//! Route paths.

pub const GET_HEALTH: &str = "/health";
pub const POST_CHAT: &str = "/chat";
pub const POST_CONTACT: &str = "/contact";
