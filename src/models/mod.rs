pub mod audit;
pub mod bar;
pub mod book;
pub mod candle;
pub mod context;
pub mod decision;
pub mod direction;
pub mod interval;
pub mod pattern;
pub mod position;
pub mod requests;
