use futures::future::BoxFuture;

use crate::contest::Contest;
use crate::errors::BackendError;
use crate::registration::{NewRegistration, Registration};

/// Selects registrations for the admin views.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    /// Only this contest, or every contest if `None`.
    pub contest: Option<Contest>,

    /// Case-insensitive substring of the name or email, or a substring
    /// of the WhatsApp number.
    pub search: Option<String>,
}

impl Filter {
    pub fn new(contest: Option<Contest>, search: Option<&str>) -> Self {
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned);

        Filter { contest, search }
    }

    /// Whether a registration is selected by this filter.
    pub fn matches(&self, registration: &Registration) -> bool {
        if let Some(contest) = self.contest {
            if registration.contest != contest {
                return false;
            }
        }

        match &self.search {
            None => true,
            Some(search) => {
                let needle = search.to_lowercase();

                registration.name.to_lowercase().contains(&needle)
                    || registration
                        .email
                        .as_ref()
                        .map_or(false, |e| e.to_lowercase().contains(&needle))
                    || registration.whatsapp.contains(search.as_str())
            }
        }
    }
}

pub trait Db {
    /// Stores a new registration, assigning its ID and creation time.
    fn create(&self, registration: NewRegistration) -> BoxFuture<Result<Registration, BackendError>>;

    /// Retrieves every registration selected by `filter`, newest first.
    fn query(&self, filter: &Filter) -> BoxFuture<Result<Vec<Registration>, BackendError>>;
}

pub use self::memory::MemoryDb;
pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
    };
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::Filter;
    use crate::contest::Contest;
    use crate::errors::BackendError;
    use crate::registration::{NewRegistration, Registration};

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }

        /// Creates the registrations table and its indexes if they
        /// don't exist yet.
        pub async fn ensure_schema(&self) -> Result<(), BackendError> {
            use sqlx::Executor;

            self.pool
                .execute(include_str!("queries/schema.sql"))
                .await
                .map_err(map_sqlx_error)?;

            Ok(())
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn create(
            &self,
            registration: NewRegistration,
        ) -> BoxFuture<Result<Registration, BackendError>> {
            async move {
                let id = Uuid::new_v4();
                let query = sqlx::query_as(include_str!("queries/create.sql"));

                let (created_at,): (OffsetDateTime,) = query
                    .bind(id)
                    .bind(&registration.name)
                    .bind(registration.age)
                    .bind(&registration.whatsapp)
                    .bind(&registration.email)
                    .bind(registration.contest.as_str())
                    .bind(&registration.message)
                    .bind(registration.number_of_children)
                    .bind(&registration.photo_url)
                    .bind(&registration.video_url)
                    .bind(&registration.ip_address)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(registration.into_registration(id, created_at))
            }
            .boxed()
        }

        fn query(&self, filter: &Filter) -> BoxFuture<Result<Vec<Registration>, BackendError>> {
            let contest = filter.contest.map(Contest::as_str);
            let pattern = filter
                .search
                .as_ref()
                .map(|s| format!("%{}%", escape_like(s)));

            async move {
                let query = sqlx::query(include_str!("queries/query.sql"));

                let registrations = query
                    .bind(contest)
                    .bind(pattern)
                    .try_map(|row: PgRow| registration_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(registrations)
            }
            .boxed()
        }
    }

    fn registration_from_row(row: &PgRow) -> Result<Registration, sqlx::Error> {
        let contest: String = try_get(row, "contest")?;
        let contest: Contest = contest
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Registration {
            id: try_get(row, "id")?,
            name: try_get(row, "name")?,
            age: try_get(row, "age")?,
            whatsapp: try_get(row, "whatsapp")?,
            email: try_get(row, "email")?,
            contest,
            message: try_get(row, "message")?,
            number_of_children: try_get(row, "number_of_children")?,
            photo_url: try_get(row, "photo_url")?,
            video_url: try_get(row, "video_url")?,
            created_at: try_get(row, "created_at")?,
            ip_address: try_get(row, "ip_address")?,
        })
    }

    /// Escapes the `LIKE` metacharacters so a search term matches literally.
    pub(crate) fn escape_like(raw: &str) -> String {
        let mut escaped = String::with_capacity(raw.len());

        for c in raw.chars() {
            if matches!(c, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(c);
        }

        escaped
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        BackendError::Sqlx { source: error }
    }

    #[cfg(test)]
    mod tests {
        use super::escape_like;

        #[test]
        fn like_metacharacters_are_escaped() {
            assert_eq!(escape_like("raj"), "raj");
            assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        }
    }
}

mod memory {
    use std::sync::RwLock;

    use futures::future::{self, BoxFuture, FutureExt};
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::Filter;
    use crate::errors::BackendError;
    use crate::registration::{NewRegistration, Registration};

    /// Keeps registrations in process memory. Used by the test suites
    /// in place of PostgreSQL.
    #[derive(Default)]
    pub struct MemoryDb {
        registrations: RwLock<Vec<Registration>>,
    }

    impl MemoryDb {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn len(&self) -> usize {
            self.read().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Registration>> {
            self.registrations
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    impl super::Db for MemoryDb {
        fn create(
            &self,
            registration: NewRegistration,
        ) -> BoxFuture<Result<Registration, BackendError>> {
            let registration =
                registration.into_registration(Uuid::new_v4(), OffsetDateTime::now_utc());

            self.registrations
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(registration.clone());

            future::ready(Ok(registration)).boxed()
        }

        fn query(&self, filter: &Filter) -> BoxFuture<Result<Vec<Registration>, BackendError>> {
            // newest insertion first, so equal timestamps keep that order
            let mut selected: Vec<Registration> = self
                .read()
                .iter()
                .rev()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect();

            selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            future::ready(Ok(selected)).boxed()
        }
    }
}
