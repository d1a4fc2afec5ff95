pub mod auth;
pub mod errors;
pub mod invoice;
pub mod notification;
pub mod order;
pub mod ports;
pub mod pricing;
pub mod shipment;
