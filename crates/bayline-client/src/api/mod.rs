//! API endpoint implementations.

mod ai;
mod appointments;
mod auth;
mod customers;
mod estimates;
mod health;
mod invoices;
mod jobs;
mod migration;
mod obd2;
mod resource;
mod vehicles;

pub use ai::AiApi;
pub use appointments::AppointmentsApi;
pub use auth::AuthApi;
pub use customers::CustomersApi;
pub use estimates::EstimatesApi;
pub use health::HealthApi;
pub use invoices::InvoicesApi;
pub use jobs::JobsApi;
pub use migration::MigrationApi;
pub use obd2::{Obd2Api, parse_codes, validate_code};
pub use vehicles::VehiclesApi;
