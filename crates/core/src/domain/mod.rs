pub mod order;
pub mod product;
pub mod quote;
