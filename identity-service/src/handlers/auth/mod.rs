pub mod password;
pub mod registration;
pub mod session;
pub mod two_factor;

pub use password::{forgot_password, reset_password};
pub use registration::register;
pub use session::{confirm_login, login, logout};
pub use two_factor::{disable_two_factor, setup_two_factor, verify_setup, verify_two_factor};

use crate::models::UserView;

/// The abbreviated projection returned from login-lifecycle endpoints.
pub(crate) fn user_summary(user: &UserView) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "email": user.email,
        "name": user.name,
    })
}
