pub mod assist;
pub mod contact;
pub mod line;
pub mod product;
pub mod session;
