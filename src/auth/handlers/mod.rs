pub mod health;
pub use self::health::health;

pub mod otp;
pub use self::otp::{request_otp, verify_otp};

pub mod token;
pub use self::token::{logout, logout_all, me, refresh};
