pub mod balance;
pub mod instrument;
pub mod order;
pub mod trade;
pub mod user;

pub use balance::*;
pub use instrument::*;
pub use order::*;
pub use trade::*;
pub use user::*;

use serde::Serialize;

/// Plain `{"success": true}` acknowledgement.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub success: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        Self { success: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}
