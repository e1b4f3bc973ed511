mod collection;

pub use collection::{ensure_indexes_exist, is_duplicate_key_error, Coll, MongoCollection};
