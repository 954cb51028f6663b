pub mod admin;
pub mod carpool;
pub mod common;
pub mod group;
pub mod market;
pub mod message;
pub mod notification;
pub mod user;

pub use common::{ApiResponse, BulkUpdateResponse, MessageResponse, Page, PageQuery, Pagination};
