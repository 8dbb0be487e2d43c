pub mod breakdown;
pub mod conversation;
pub mod options;
pub mod product;
pub mod specification;
pub mod tier;
