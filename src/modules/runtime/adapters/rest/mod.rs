//! Paginated REST adapters
//!
//! Every adapter here drains all pages through [`pagination::drain`] before
//! returning, so results are held in memory in full.

mod airtable;
mod freshworks;
mod hubspot;
mod odoo;
pub mod pagination;
mod sap;
mod servicenow;
mod shopify;
mod wix;
mod woocommerce;
mod zoho;

pub use airtable::AirtableAdapter;
pub use freshworks::FreshworksAdapter;
pub use hubspot::HubspotAdapter;
pub use odoo::{OdooAdapter, READ_METHODS as ODOO_READ_METHODS};
pub use sap::SapAdapter;
pub use servicenow::ServicenowAdapter;
pub use shopify::ShopifyAdapter;
pub use wix::WixAdapter;
pub use woocommerce::WoocommerceAdapter;
pub use zoho::ZohoAdapter;
