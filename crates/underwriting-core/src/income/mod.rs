pub mod expenses;
pub mod revenue;
