pub mod contents;
pub mod items;
pub mod permissions;
pub mod storage;
