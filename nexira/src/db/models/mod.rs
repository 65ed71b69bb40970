pub mod image_tasks;
pub mod ledgers;
pub mod payment_sessions;
pub mod plans;
pub mod price_books;
pub mod users;
