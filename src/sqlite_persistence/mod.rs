mod versioned_schema;

pub use versioned_schema::{
    open_versioned, read_db_version, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table,
    VersionedSchema, BASE_DB_VERSION, DEFAULT_TIMESTAMP_MS,
};
