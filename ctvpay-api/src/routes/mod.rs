/// API route handlers, organized by resource
///
/// - `health`: Health check
/// - `auth`: Login and token refresh
/// - `session`: Navigation guard
/// - `me`: Caller's profile
/// - `salaries`: Caller's salary feed (pages and live stream)
/// - `dashboard`: Dashboard totals
/// - `announcements`: Latest announcement
/// - `admin_users`: User directory administration
/// - `admin_salaries`: Salary entry, import and status changes

pub mod admin_salaries;
pub mod admin_users;
pub mod announcements;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod me;
pub mod salaries;
pub mod session;
