pub mod health;
pub mod intakes;
pub mod links;
pub mod summaries;
