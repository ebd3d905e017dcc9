mod handler;
pub mod model;

pub use handler::{delete_user, get_user_details, home, register, update_user_details};
