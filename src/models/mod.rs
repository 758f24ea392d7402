mod creator;
mod notification;
mod payment;
mod supporter;
mod user;

pub use creator::*;
pub use notification::*;
pub use payment::*;
pub use supporter::*;
pub use user::*;
