//! Post-level status derived from per-link outcomes

use crate::types::PostStatus;

/// All-or-nothing aggregation over link statuses.
///
/// Returns `None` for an empty set, leaving the post status to the caller.
/// Otherwise the post is `Published` only when every link is; any link
/// that is not yet published (failed, or never attempted) makes it `Failed`.
/// Partial success is visible on the links themselves.
pub fn derive_post_status<'a, I>(link_statuses: I) -> Option<PostStatus>
where
    I: IntoIterator<Item = &'a PostStatus>,
{
    let mut statuses = link_statuses.into_iter().peekable();
    statuses.peek()?;

    if statuses.all(|status| *status == PostStatus::Published) {
        Some(PostStatus::Published)
    } else {
        Some(PostStatus::Failed)
    }
}
