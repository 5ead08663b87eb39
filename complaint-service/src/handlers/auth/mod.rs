pub mod password;
pub mod session;

pub use password::{change_password, forget_password, reset_password};
pub use session::{login, refresh_token, REFRESH_COOKIE};
