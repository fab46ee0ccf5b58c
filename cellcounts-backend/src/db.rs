use camino::Utf8Path;
use error::QueryError;
use diesel::{
    connection::SimpleConnection,
    prelude::*,
    r2d2::{ConnectionManager, CustomizeConnection, Pool},
};

pub mod error;
pub mod load;
pub mod query;
mod schema;
#[cfg(test)]
pub(crate) mod test_util;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const SCHEMA: &str = include_str!("db/schema.sql");
const MAX_POOL_SIZE: u32 = 4;

/// Opens a read-write connection with foreign keys enforced.
///
/// # Errors
pub fn establish(path: &Utf8Path) -> error::Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(path.as_str())?;
    ConnectionOptions { read_only: false }.apply(&mut conn)?;

    Ok(conn)
}

/// Drops both tables if they exist and creates them again, empty.
///
/// # Errors
pub fn reset_schema(conn: &mut SqliteConnection) -> error::Result<()> {
    conn.batch_execute(SCHEMA)?;

    Ok(())
}

/// A pool whose connections refuse writes. The server only ever reads, and
/// never creates the store file.
///
/// # Errors
pub fn read_only_pool(path: &Utf8Path) -> Result<DbPool, QueryError> {
    if !path.is_file() {
        return Err(QueryError::StoreMissing {
            path: path.to_owned(),
        });
    }

    let manager = ConnectionManager::<SqliteConnection>::new(format!("file:{path}?mode=ro"));

    let pool = Pool::builder()
        .max_size(MAX_POOL_SIZE)
        .connection_customizer(Box::new(ConnectionOptions { read_only: true }))
        .build(manager)?;

    Ok(pool)
}

#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    read_only: bool,
}

impl ConnectionOptions {
    fn apply(self, conn: &mut SqliteConnection) -> QueryResult<()> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
        if self.read_only {
            conn.batch_execute("PRAGMA query_only = ON;")?;
        }

        Ok(())
    }
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        self.apply(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

#[cfg(test)]
mod tests {
    use diesel::{prelude::*, sql_types::Integer};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use camino::Utf8PathBuf;

    use super::{error::QueryError, read_only_pool, reset_schema, test_util::empty_db};

    #[derive(QueryableByName)]
    struct Flag {
        #[diesel(sql_type = Integer)]
        foreign_keys: i32,
    }

    #[rstest]
    fn reset_is_idempotent(#[from(empty_db)] mut conn: SqliteConnection) {
        reset_schema(&mut conn).unwrap();
        reset_schema(&mut conn).unwrap();
    }

    #[rstest]
    fn foreign_keys_are_enforced(#[from(empty_db)] mut conn: SqliteConnection) {
        let flag: Flag = diesel::sql_query("PRAGMA foreign_keys")
            .get_result(&mut conn)
            .unwrap();

        assert_eq!(flag.foreign_keys, 1);
    }

    #[test]
    fn read_only_pool_never_creates_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = Utf8PathBuf::try_from(dir.path().join("missing.db")).unwrap();

        let err = read_only_pool(&db_path).unwrap_err();

        assert!(matches!(err, QueryError::StoreMissing { .. }), "{err}");
        assert!(!db_path.exists());
    }
}
