pub mod disk_storage;
pub mod memory_storage;
pub mod storage_engine;
pub mod upload_service;
