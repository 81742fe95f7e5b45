pub mod billing;
pub mod cookies;
pub mod error;
pub mod oauth;
pub mod password;
pub mod publish;
pub mod session;
