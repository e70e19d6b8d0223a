use sea_orm::{DbErr, TransactionError};

pub fn flatten_transaction_error(err: TransactionError<DbErr>) -> DbErr {
    match err {
        TransactionError::Connection(e) => e,
        TransactionError::Transaction(e) => e,
    }
}

pub mod prelude {
    pub use entity::prelude::*;
    pub use entity::{email, email_metadata, task};
    pub use sea_orm::{
        entity::prelude::*,
        sea_query::OnConflict,
        ActiveValue::{NotSet, Set},
        Condition, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
        FromQueryResult, InsertResult, JoinType, Order, QueryOrder, QuerySelect, TransactionTrait,
        Value,
    };

    pub use super::flatten_transaction_error;
}
