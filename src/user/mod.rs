mod core;
mod handlers;

pub use core::{
    Role, User, UserID, UserProfile, count_users, create_user, create_user_table, get_user_by_email,
    normalize_email, update_password,
};
pub use handlers::{change_password, delete_current_user, get_current_user, update_current_user};
