pub mod ocr;
pub mod quota;
pub mod session;
pub mod user;

pub use ocr::*;
pub use quota::*;
pub use session::*;
pub use user::*;
