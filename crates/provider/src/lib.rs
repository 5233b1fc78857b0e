pub mod company;
pub mod crm_writer;
pub mod http;
pub mod places;
pub mod webtech;

pub use company::CompanyAdapter;
pub use crm_writer::{CrmRestWriter, SharedCrmWriter};
pub use places::PlacesAdapter;
pub use webtech::WebTechAdapter;
