mod error;
mod gate;
mod traits;

pub use error::SessionError;
pub use gate::{check_admin, credentials_match, CURRENT_USER_KEY, IS_AUTHENTICATED_KEY, REMEMBER_ME_KEY};
pub use traits::{KeyValueStore, Result};
