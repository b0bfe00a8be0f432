//! Named date ranges for reporting.

mod core;
mod handlers;

pub use core::{PeriodId, create_period_table, get_period};
pub use handlers::{
    create_period_endpoint, delete_period_endpoint, get_period_endpoint,
    get_period_summary_endpoint, list_periods_endpoint, update_period_endpoint,
};
