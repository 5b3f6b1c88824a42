pub mod audit;
pub mod bars;
pub mod book;
pub mod executions;
pub mod health;
