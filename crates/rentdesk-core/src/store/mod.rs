pub mod bulk;
pub mod error;
pub mod list_store;
pub mod notification_store;
pub mod property_store;
pub mod state;
pub mod ui_store;

pub use bulk::{BulkOperation, BulkOperationState};
pub use error::StoreError;
pub use list_store::{Cached, EntityCache, EntityStore, FetchParams};
pub use notification_store::{
    NotificationResource, NotificationSession, NotificationSnapshot, NotificationStore,
};
pub use property_store::{
    PropertyResource, PropertySession, PropertySnapshot, PropertyStore, RelatedList,
};
pub use state::{ListState, Pagination};
pub use ui_store::{CommandPalette, GlobalSearch, UiSnapshot, UiState, UiStore};
