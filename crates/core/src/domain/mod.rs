pub mod price;
pub mod stock;
