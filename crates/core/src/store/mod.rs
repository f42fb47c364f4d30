mod change;
mod error;
mod query;
mod traits;

pub use change::{ChangeEvent, ChangeKind};
pub use error::{FetchError, Result, StoreError, WriteError, WriteOp};
pub use query::{
    compare_values, like_match, lookup, sort_rows, Embed, Filter, FilterOp, Order, Query,
    Relation, Select,
};
pub use traits::{ChangeFeed, Record, RecordId, RemoteStore};
