pub mod klines;
pub mod pool;
pub mod trades;
