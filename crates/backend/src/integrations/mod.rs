//! Clients for the external services a task write fans out to.

pub mod calendar;
pub mod google_oauth;
pub mod mailer;
pub mod templates;

pub use calendar::{CalendarProvider, DisabledCalendar, GoogleCalendar};
pub use mailer::{EmailMessage, Mailer};
