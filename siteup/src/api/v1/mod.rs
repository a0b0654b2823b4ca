pub mod health;
pub mod site_update;
pub mod upload_chunk;
pub mod upload_status;
