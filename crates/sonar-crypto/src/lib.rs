/// Sonar Crypto Library
///
/// Password storage (Argon2id PHC strings) and generation of the opaque keys
/// handed out as auth tokens. Nothing here touches the database.

pub mod keys;
pub mod password;
