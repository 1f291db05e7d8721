//! Canada Post non-contract shipping web services.
//!
//! # Purpose
//! Wire codec (namespaced XML request/response types) and a basic-auth
//! HTTPS client for the rating, shipment, artifact, refund and post-office
//! lookup services.
pub mod client;
pub mod error;
pub mod postoffice;
pub mod types;

pub use client::{CarrierApi, Client, from_xml, parse_message_envelope, parse_refund_response, to_xml};
pub use error::CarrierError;
pub use postoffice::{PostOffice, base_display, format_display, normalize_postal_code};
