pub mod google;
pub mod password;
pub mod permissions;
pub mod token;
