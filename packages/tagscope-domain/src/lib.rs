pub mod delta;
pub mod node_ref;
pub mod paging;
pub mod tag;
pub mod tag_details;

pub use delta::{PendingTagUpdates, TagChanges, TagUpdates};
pub use node_ref::{Aspect, NodeRef, NodeRefError, StoreRef, Tag};
pub use paging::{PagingRequest, PagingResults};
pub use tag::TagNameError;
pub use tag_details::{TagDetails, TagScope};
