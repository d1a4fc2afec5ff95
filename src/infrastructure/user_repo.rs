use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::auth::UserProfile;
use crate::domain::errors::DomainError;
use crate::domain::ports::UserRepository;
use crate::schema::profiles;

use super::models::ProfileRow;

pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl UserRepository for DieselUserRepository {
    fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = profiles::table
            .find(id)
            .select(ProfileRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(ProfileRow::into_profile))
    }
}
