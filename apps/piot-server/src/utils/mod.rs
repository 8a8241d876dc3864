pub mod cipher;
pub mod response;
