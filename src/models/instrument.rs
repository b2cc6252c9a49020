use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Instrument {
    pub id: Uuid,
    pub name: String,
    pub ticker: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInstrumentRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, max = 10, message = "ticker must be 1-10 characters"))]
    pub ticker: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct InstrumentResponse {
    pub name: String,
    pub ticker: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn ticker_length_is_bounded() {
        let req = CreateInstrumentRequest {
            name: "Memcoin".into(),
            ticker: "MEMO".into(),
        };
        assert!(req.validate().is_ok());

        let req = CreateInstrumentRequest {
            name: "Memcoin".into(),
            ticker: "WAYTOOLONGTICKER".into(),
        };
        assert!(req.validate().is_err());
    }
}
