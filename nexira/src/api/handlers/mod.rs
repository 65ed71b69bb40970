pub mod auth;
pub mod enhance;
pub mod ledgers;
pub mod payments;
pub mod plans;
pub mod price_books;
pub mod users;
