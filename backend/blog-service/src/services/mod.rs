/// Business logic layer for blog-service
///
/// This module provides high-level operations:
/// - Feed composition: global, group, profile and follow feeds
/// - Social graph: follow edges and their counts
/// - Content mutation: posts and comments, gated by authorship
/// - Search over users and posts
/// - Administrative group and user operations
///
/// Services are cheap to clone and take the acting user as an explicit argument.
pub mod comments;
pub mod feed;
pub mod follow;
pub mod groups;
pub mod pagination;
pub mod posts;
pub mod search;
pub mod users;

// Re-export commonly used services
pub use comments::CommentService;
pub use feed::{FeedService, GroupFeed, ProfileFeed};
pub use follow::{FollowOutcome, FollowService};
pub use groups::GroupService;
pub use pagination::{Page, PageQuery, PageRequest, Paginator};
pub use posts::{ImageChange, Mutation, PostInput, PostService};
pub use search::{SearchResults, SearchService};
pub use users::UserService;
