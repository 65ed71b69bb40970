pub mod image_tasks;
pub mod ledgers;
pub mod payment_sessions;
pub mod plans;
pub mod price_books;
pub mod users;

pub use image_tasks::ImageTasks;
pub use ledgers::Ledgers;
pub use payment_sessions::{ConfirmOutcome, PaymentSessions};
pub use plans::Plans;
pub use price_books::PriceBooks;
pub use users::Users;
