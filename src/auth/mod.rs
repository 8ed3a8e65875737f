//! Authentication: credential persistence and bearer-token sessions.

pub mod clock;
pub mod credentials;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{Credential, CredentialStore, CREDENTIALS_FILE_NAME};
pub use session::{
    token_ttl, SessionManager, SessionToken, ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD, TOKEN_BYTES,
};
