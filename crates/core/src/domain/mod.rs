pub mod alternative;
pub mod product;
