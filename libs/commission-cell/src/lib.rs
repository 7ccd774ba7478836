pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::{create_commission_router, create_doctor_config_router, create_payment_router};
pub use services::accrual::CommissionAccrualEngine;
