// Services module - Business logic

pub mod aggregation;
pub mod review;
pub mod validation;
