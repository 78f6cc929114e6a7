pub mod jwt;
pub mod session;

pub use session::{AuthState, SessionController, USER_DATA_KEY};
