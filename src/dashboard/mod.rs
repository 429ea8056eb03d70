//! Dashboard module
//!
//! Provides an overview page showing the filtered transactions, their sale
//! statistics and charts of the price ranges and categories.

mod charts;
mod handlers;
mod tables;

pub use handlers::get_dashboard_page;
