pub mod bson;
pub mod password;
pub mod validation;

pub use self::bson::{bson_to_json, document_to_json};
pub use password::{hash_password, verify_password, Password, PasswordHashString};
pub use validation::ValidatedJson;
