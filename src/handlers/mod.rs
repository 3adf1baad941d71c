mod forms;
mod health;
mod intake;
mod metrics;

pub use forms::{contact_handler, inquiry_handler, newsletter_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
