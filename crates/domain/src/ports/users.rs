use crate::DomainResult;
use crate::identity::UserProfile;

pub trait UserRepository: Send + Sync {
    fn get_user(
        &self,
        user_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<UserProfile>>>;

    /// Returns the profiles that exist; unknown ids are skipped.
    fn get_users(
        &self,
        user_ids: &[String],
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<UserProfile>>>;

    fn upsert_user(
        &self,
        user: &UserProfile,
    ) -> crate::ports::BoxFuture<'_, DomainResult<UserProfile>>;
}
